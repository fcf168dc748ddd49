//! Per-profile directory layout and file helpers.
//!
//! ```text
//! <vault_root>/<profile_id>/
//!     vault_metadata.json
//!     temp_unlock.json
//!     folders/<vault_location>/**.enc
//!     metadata/<vault_location>.json
//!     temp/
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::config::{
    FOLDERS_DIRNAME, METADATA_FILENAME, META_DIRNAME, TEMP_DIRNAME, TEMP_UNLOCK_FILENAME,
};
use phantomvault_common::{Error, ProfileId, Result};
use phantomvault_crypto::sha256_hex;

/// Paths inside one profile's vault directory.
#[derive(Debug, Clone)]
pub struct VaultLayout {
    root: PathBuf,
}

impl VaultLayout {
    /// Layout for `profile_id` under `vault_root`.
    pub fn new(vault_root: &Path, profile_id: &ProfileId) -> Self {
        Self {
            root: vault_root.join(profile_id.as_str()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.root.join(METADATA_FILENAME)
    }

    pub fn temp_unlock_file(&self) -> PathBuf {
        self.root.join(TEMP_UNLOCK_FILENAME)
    }

    pub fn folders_dir(&self) -> PathBuf {
        self.root.join(FOLDERS_DIRNAME)
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join(META_DIRNAME)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIRNAME)
    }

    /// Encrypted tree for one vault location.
    pub fn folder_dir(&self, location: &str) -> PathBuf {
        self.folders_dir().join(location)
    }

    /// Folder metadata file for one vault location.
    pub fn folder_metadata_file(&self, location: &str) -> PathBuf {
        self.meta_dir().join(format!("{}.json", location))
    }

    /// Create the directory skeleton with owner-only permissions.
    pub fn create(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.folders_dir(),
            self.meta_dir(),
            self.temp_dir(),
        ] {
            create_private_dir(&dir)?;
        }
        Ok(())
    }
}

/// Resolve `path` to an absolute, lexically normalized form.
///
/// `.` components are dropped and `..` pops the previous component. The
/// filesystem is not consulted, so the result is stable whether or not the
/// folder is currently visible.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidInput("Folder path cannot be empty".to_string()));
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Content address of a folder: hex SHA-256 of its normalized path.
pub fn vault_location(normalized: &Path) -> String {
    sha256_hex(normalized.to_string_lossy().as_bytes())
}

/// Create `dir` (and parents) and restrict it to the owner.
pub fn create_private_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    set_mode(dir, 0o700)
}

/// Restrict a file to owner read/write.
pub fn set_private_file(path: &Path) -> Result<()> {
    set_mode(path, 0o600)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Write `bytes` to `dest` through a staging file in the same directory.
///
/// The staging file is synced before it is renamed over `dest`, so readers
/// see either the old or the new content.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| Error::InvalidInput("Destination has no parent directory".to_string()))?;
    fs::create_dir_all(parent)?;

    let staging = parent.join(format!(".{}.staging", Uuid::new_v4()));
    let written = (|| -> Result<()> {
        let mut file = File::create(&staging)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        set_private_file(&staging)?;
        fs::rename(&staging, dest)?;
        Ok(())
    })();

    if written.is_err() {
        let _ = fs::remove_file(&staging);
    }
    written
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json<T: Serialize>(dest: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(dest, &bytes)
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove a directory tree, treating "already gone" as success.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// True if something exists at `path` without following a final symlink.
pub fn path_present(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_path() {
        let normalized = normalize_path(Path::new("/tmp/./a/../b/")).unwrap();
        assert_eq!(normalized, PathBuf::from("/tmp/b"));

        let relative = normalize_path(Path::new("f")).unwrap();
        assert!(relative.is_absolute());
        assert!(relative.ends_with("f"));

        assert!(normalize_path(Path::new("")).is_err());
    }

    #[test]
    fn test_vault_location_is_stable_hash() {
        let a = vault_location(Path::new("/tmp/f"));
        let b = vault_location(&normalize_path(Path::new("/tmp/x/../f")).unwrap());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(!a.contains("tmp"));
        assert_ne!(a, vault_location(Path::new("/tmp/g")));
    }

    #[test]
    fn test_layout_paths() {
        let profile = ProfileId::new("p1").unwrap();
        let layout = VaultLayout::new(Path::new("/vaults"), &profile);

        assert_eq!(layout.root(), Path::new("/vaults/p1"));
        assert_eq!(
            layout.metadata_file(),
            PathBuf::from("/vaults/p1/vault_metadata.json")
        );
        assert_eq!(
            layout.folder_metadata_file("abc"),
            PathBuf::from("/vaults/p1/metadata/abc.json")
        );
        assert_eq!(layout.folder_dir("abc"), PathBuf::from("/vaults/p1/folders/abc"));
    }

    #[cfg(unix)]
    #[test]
    fn test_layout_create_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let layout = VaultLayout::new(temp.path(), &ProfileId::new("p1").unwrap());
        layout.create().unwrap();

        for dir in [layout.root().to_path_buf(), layout.folders_dir(), layout.meta_dir()] {
            let mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
        }
    }

    #[test]
    fn test_write_json_atomic_replaces() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");

        write_json(&path, &vec![1, 2, 3]).unwrap();
        write_json(&path, &vec![4]).unwrap();

        let restored: Vec<u32> = read_json(&path).unwrap();
        assert_eq!(restored, vec![4]);
        let leftovers = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_remove_if_exists_tolerates_missing() {
        let temp = TempDir::new().unwrap();
        remove_file_if_exists(&temp.path().join("missing")).unwrap();
        remove_dir_if_exists(&temp.path().join("missing")).unwrap();
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(segments in proptest::collection::vec("[a-z.]{1,4}", 1..6)) {
            let raw = PathBuf::from("/").join(segments.join("/"));
            let once = normalize_path(&raw).unwrap();
            let twice = normalize_path(&once).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(vault_location(&once), vault_location(&twice));
        }
    }
}
