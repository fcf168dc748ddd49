//! Vault engine for PhantomVault.
//!
//! This module provides:
//! - Per-profile vaults that lock folders into encrypted trees
//! - Temporary and permanent unlock with re-lock tracking
//! - Integrity validation and cleanup of corrupted entries
//! - A manager that owns every profile vault under one root
//!
//! # Architecture
//! The vault sits between the access-control layer and the filesystem.
//! Every file is sealed by the encryption engine; stored names are derived
//! from a hash of the original folder path, never from the path itself.

pub mod conceal;
pub mod config;
pub mod envelope;
pub mod layout;
pub mod manager;
pub mod metadata;
pub mod profile;
pub mod tree;

pub use conceal::{FolderConcealer, RenameConcealer};
pub use config::{VaultSettings, VaultVersion};
pub use manager::{MaintenanceReport, VaultManager, VaultUsage};
pub use metadata::{LockedFolderInfo, TemporaryUnlockState, VaultMetadata};
pub use profile::{IntegrityReport, ProfileVault, RelockReport, UnlockMode};
pub use tree::TreeSummary;
