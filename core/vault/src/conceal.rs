//! Hiding locked folders from their visible location.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::HIDDEN_SUFFIX;
use crate::layout::{path_present, remove_dir_if_exists};
use phantomvault_common::{Error, Result};

/// Moves a folder out of view and disposes of hidden copies.
///
/// Implementations run inside blocking vault tasks and must not block on
/// async work.
pub trait FolderConcealer: Send + Sync {
    /// Where `original` lives while hidden.
    fn hidden_path(&self, original: &Path) -> Result<PathBuf>;

    /// Hide `original`, replacing any stale hidden copy.
    ///
    /// # Postconditions
    /// - On success nothing remains at `original`
    /// - On failure `original` is untouched
    fn hide(&self, original: &Path) -> Result<PathBuf>;

    /// Delete the hidden copy of `original`, if any.
    fn discard_hidden(&self, original: &Path) -> Result<()>;
}

/// Hides `<parent>/<name>` by renaming it to `<parent>/.<name>.phantomvault_hidden`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameConcealer;

impl FolderConcealer for RenameConcealer {
    fn hidden_path(&self, original: &Path) -> Result<PathBuf> {
        let name = original.file_name().ok_or_else(|| {
            Error::InvalidInput(format!("Cannot hide {}", original.display()))
        })?;
        let mut hidden = std::ffi::OsString::from(".");
        hidden.push(name);
        hidden.push(HIDDEN_SUFFIX);
        Ok(original.with_file_name(hidden))
    }

    fn hide(&self, original: &Path) -> Result<PathBuf> {
        let hidden = self.hidden_path(original)?;
        if path_present(&hidden) {
            debug!(path = %hidden.display(), "Replacing stale hidden copy");
            remove_dir_if_exists(&hidden)?;
        }
        fs::rename(original, &hidden)?;
        Ok(hidden)
    }

    fn discard_hidden(&self, original: &Path) -> Result<()> {
        remove_dir_if_exists(&self.hidden_path(original)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hidden_path() {
        let concealer = RenameConcealer;
        assert_eq!(
            concealer.hidden_path(Path::new("/tmp/f")).unwrap(),
            PathBuf::from("/tmp/.f.phantomvault_hidden")
        );
        assert!(concealer.hidden_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_hide_replaces_stale_copy() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("f");
        let concealer = RenameConcealer;

        fs::create_dir(&original).unwrap();
        fs::write(original.join("old.txt"), b"old").unwrap();
        concealer.hide(&original).unwrap();

        fs::create_dir(&original).unwrap();
        fs::write(original.join("new.txt"), b"new").unwrap();
        let hidden = concealer.hide(&original).unwrap();

        assert!(!original.exists());
        assert!(hidden.join("new.txt").exists());
        assert!(!hidden.join("old.txt").exists());

        concealer.discard_hidden(&original).unwrap();
        assert!(!hidden.exists());
    }

    #[test]
    fn test_hide_missing_folder_fails() {
        let temp = TempDir::new().unwrap();
        assert!(RenameConcealer.hide(&temp.path().join("missing")).is_err());
    }
}
