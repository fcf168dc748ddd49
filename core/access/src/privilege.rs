//! Host privilege levels, privileged operations and elevation.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use phantomvault_common::{Error, Result};

/// Host privilege held by the current process, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeLevel {
    User,
    /// Member of an administrative group but not running as root.
    Elevated,
    Admin,
    System,
}

impl PrivilegeLevel {
    /// True for `Admin` and above.
    pub fn is_admin(&self) -> bool {
        *self >= PrivilegeLevel::Admin
    }
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Elevated => "elevated",
            Self::Admin => "admin",
            Self::System => "system",
        };
        f.write_str(name)
    }
}

/// Operations gated by access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegedOperation {
    VaultAccess,
    FolderHiding,
    ProfileCreation,
    ServiceManagement,
    SystemMonitoring,
    FileEncryption,
    RecoveryOperations,
}

impl PrivilegedOperation {
    /// Whether single-layer mode demands admin privilege for this operation.
    pub fn requires_admin(&self, require_elevation_for_vault: bool) -> bool {
        match self {
            Self::FileEncryption => false,
            Self::VaultAccess => require_elevation_for_vault,
            Self::FolderHiding
            | Self::ProfileCreation
            | Self::ServiceManagement
            | Self::SystemMonitoring
            | Self::RecoveryOperations => true,
        }
    }
}

impl fmt::Display for PrivilegedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VaultAccess => "vault access",
            Self::FolderHiding => "folder hiding",
            Self::ProfileCreation => "profile creation",
            Self::ServiceManagement => "service management",
            Self::SystemMonitoring => "system monitoring",
            Self::FileEncryption => "file encryption",
            Self::RecoveryOperations => "recovery operations",
        };
        f.write_str(name)
    }
}

/// Reports the privilege level of the running process.
pub trait PrivilegeProbe: Send + Sync {
    fn detect(&self) -> PrivilegeLevel;
}

/// Attempts to raise the process to admin privilege.
pub trait Elevator: Send + Sync {
    /// Request elevation, explaining why in `reason`.
    ///
    /// # Errors
    /// - `NotPermitted` if elevation is refused or impossible
    fn request(&self, reason: &str) -> Result<PrivilegeLevel>;
}

/// Probe backed by the real process credentials.
///
/// Effective uid 0 is `Admin`. Membership of `sudo`, `wheel` or `admin` is
/// `Elevated`. Anything else is `User`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessPrivilege;

const ADMIN_GROUPS: [&str; 3] = ["sudo", "wheel", "admin"];

impl PrivilegeProbe for ProcessPrivilege {
    #[cfg(unix)]
    fn detect(&self) -> PrivilegeLevel {
        // SAFETY: geteuid has no preconditions and cannot fail.
        if unsafe { libc::geteuid() } == 0 {
            return PrivilegeLevel::Admin;
        }
        let groups = unix_groups::names();
        debug!(groups = ?groups, "Detected process groups");
        if groups.iter().any(|g| ADMIN_GROUPS.contains(&g.as_str())) {
            PrivilegeLevel::Elevated
        } else {
            PrivilegeLevel::User
        }
    }

    #[cfg(not(unix))]
    fn detect(&self) -> PrivilegeLevel {
        debug!(groups = ?ADMIN_GROUPS, "Privilege detection unsupported on this platform");
        PrivilegeLevel::User
    }
}

#[cfg(unix)]
mod unix_groups {
    use std::ffi::CStr;

    /// Names of the supplementary and effective groups of this process.
    pub fn names() -> Vec<String> {
        // SAFETY: a zero-sized query writes nothing.
        let count = unsafe { libc::getgroups(0, std::ptr::null_mut()) };
        if count < 0 {
            return Vec::new();
        }
        let mut gids: Vec<libc::gid_t> = vec![0; count as usize];
        // SAFETY: `gids` has room for `count` entries.
        let filled = unsafe { libc::getgroups(count, gids.as_mut_ptr()) };
        if filled < 0 {
            return Vec::new();
        }
        gids.truncate(filled as usize);
        // SAFETY: getegid has no preconditions and cannot fail.
        gids.push(unsafe { libc::getegid() });
        gids.sort_unstable();
        gids.dedup();

        gids.into_iter().filter_map(name_of).collect()
    }

    fn name_of(gid: libc::gid_t) -> Option<String> {
        // SAFETY: `group` is plain data that getgrgid_r fully initializes on
        // success; `buffer` outlives every pointer stored into `group`.
        unsafe {
            let mut group: libc::group = std::mem::zeroed();
            let mut buffer = vec![0 as libc::c_char; 4096];
            let mut result: *mut libc::group = std::ptr::null_mut();
            let rc = libc::getgrgid_r(
                gid,
                &mut group,
                buffer.as_mut_ptr(),
                buffer.len(),
                &mut result,
            );
            if rc != 0 || result.is_null() || group.gr_name.is_null() {
                return None;
            }
            Some(CStr::from_ptr(group.gr_name).to_string_lossy().into_owned())
        }
    }
}

/// Elevation by asking the user to restart with administrator rights.
///
/// A running process cannot raise its own credentials, so every request
/// fails with guidance.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestartElevator;

impl Elevator for RestartElevator {
    fn request(&self, reason: &str) -> Result<PrivilegeLevel> {
        Err(Error::NotPermitted(format!(
            "Administrator privileges required for {}. Restart PhantomVault with sudo or as an administrator.",
            reason
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(PrivilegeLevel::User < PrivilegeLevel::Elevated);
        assert!(PrivilegeLevel::Elevated < PrivilegeLevel::Admin);
        assert!(PrivilegeLevel::Admin < PrivilegeLevel::System);
        assert!(PrivilegeLevel::System.is_admin());
        assert!(!PrivilegeLevel::Elevated.is_admin());
    }

    #[test]
    fn test_single_layer_requirements() {
        assert!(!PrivilegedOperation::FileEncryption.requires_admin(true));
        assert!(PrivilegedOperation::VaultAccess.requires_admin(true));
        assert!(!PrivilegedOperation::VaultAccess.requires_admin(false));
        assert!(PrivilegedOperation::FolderHiding.requires_admin(false));
        assert!(PrivilegedOperation::RecoveryOperations.requires_admin(false));
    }

    #[test]
    fn test_restart_elevator_always_refuses() {
        let err = RestartElevator.request("vault access").unwrap_err();
        assert!(matches!(err, Error::NotPermitted(_)));
        assert!(err.to_string().contains("vault access"));
    }

    #[test]
    fn test_process_probe_is_consistent() {
        let first = ProcessPrivilege.detect();
        assert_eq!(first, ProcessPrivilege.detect());
    }

    #[test]
    fn test_operation_serde() {
        let json = serde_json::to_string(&PrivilegedOperation::VaultAccess).unwrap();
        assert_eq!(json, "\"vault_access\"");
        assert_eq!(PrivilegeLevel::Admin.to_string(), "admin");
    }
}
