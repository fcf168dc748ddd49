//! Dual-layer access control for PhantomVault.
//!
//! Privileged vault operations require both host admin privilege and an
//! authenticated profile. This crate provides:
//! - Privilege detection and elevation
//! - Tamper-checked authentication sessions
//! - Single-layer fallback rules
//! - A background monitor for privilege loss and session expiry

pub mod config;
pub mod control;
pub mod monitor;
pub mod privilege;
pub mod state;
pub mod store;

pub use config::AccessConfig;
pub use control::{AccessControl, AccessEvent, PrivilegeLossCallback, SessionHandle};
pub use monitor::AccessMonitor;
pub use privilege::{
    Elevator, PrivilegeLevel, PrivilegeProbe, PrivilegedOperation, ProcessPrivilege,
    RestartElevator,
};
pub use state::AuthenticationState;
pub use store::ProfileAuthenticator;
