//! Persistent vault bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::VaultVersion;
use crate::envelope::SealedBlob;
use phantomvault_common::ProfileId;

/// Per-profile vault metadata, stored in `vault_metadata.json`.
///
/// `total_folders` always equals the number of `locked_folders`; it is
/// recomputed on every mutation rather than adjusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub profile_id: ProfileId,
    pub vault_version: VaultVersion,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub locked_folders: BTreeSet<PathBuf>,
    pub total_folders: usize,
    pub total_files: u64,
    /// Known plaintext sealed under the master key, enrolled on first lock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_verifier: Option<SealedBlob>,
}

impl VaultMetadata {
    /// Fresh metadata for a new vault.
    pub fn new(profile_id: ProfileId) -> Self {
        let now = Utc::now();
        Self {
            profile_id,
            vault_version: VaultVersion::CURRENT,
            created_at: now,
            last_modified: now,
            locked_folders: BTreeSet::new(),
            total_folders: 0,
            total_files: 0,
            key_verifier: None,
        }
    }

    /// Record a newly locked folder.
    pub fn track(&mut self, path: PathBuf, file_count: u64) {
        if self.locked_folders.insert(path) {
            self.total_files += file_count;
        }
        self.touch();
    }

    /// Forget a folder. Returns false if it was not tracked.
    pub fn untrack(&mut self, path: &Path, file_count: u64) -> bool {
        let removed = self.locked_folders.remove(path);
        if removed {
            self.total_files = self.total_files.saturating_sub(file_count);
        }
        self.touch();
        removed
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.locked_folders.contains(path)
    }

    fn touch(&mut self) {
        self.total_folders = self.locked_folders.len();
        self.last_modified = Utc::now();
    }
}

/// Bookkeeping for one locked folder, stored in `metadata/<location>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedFolderInfo {
    pub original_path: PathBuf,
    /// Content address of the folder inside the vault.
    pub vault_location: String,
    pub lock_timestamp: DateTime<Utc>,
    pub file_count: u64,
    pub total_size: u64,
    pub is_temporarily_unlocked: bool,
}

/// Folders currently exposed by a temporary unlock, stored in
/// `temp_unlock.json`. The file is absent when nothing is exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryUnlockState {
    pub unlocked_folders: Vec<PathBuf>,
    pub unlock_timestamp: DateTime<Utc>,
}

impl TemporaryUnlockState {
    pub fn new() -> Self {
        Self {
            unlocked_folders: Vec::new(),
            unlock_timestamp: Utc::now(),
        }
    }

    /// Track `path` and restamp the unlock time.
    pub fn add(&mut self, path: PathBuf) {
        if !self.contains(&path) {
            self.unlocked_folders.push(path);
        }
        self.unlock_timestamp = Utc::now();
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.unlocked_folders.len();
        self.unlocked_folders.retain(|p| p != path);
        before != self.unlocked_folders.len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.unlocked_folders.iter().any(|p| p == path)
    }

    pub fn is_empty(&self) -> bool {
        self.unlocked_folders.is_empty()
    }
}

impl Default for TemporaryUnlockState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_keeps_folder_count_in_sync() {
        let mut metadata = VaultMetadata::new(ProfileId::new("p1").unwrap());

        metadata.track(PathBuf::from("/a"), 3);
        metadata.track(PathBuf::from("/b"), 2);
        metadata.track(PathBuf::from("/a"), 3);
        assert_eq!(metadata.total_folders, 2);
        assert_eq!(metadata.total_files, 5);

        assert!(metadata.untrack(Path::new("/a"), 3));
        assert!(!metadata.untrack(Path::new("/a"), 3));
        assert_eq!(metadata.total_folders, 1);
        assert_eq!(metadata.total_files, 2);
    }

    #[test]
    fn test_metadata_json_roundtrip() {
        let mut metadata = VaultMetadata::new(ProfileId::new("p1").unwrap());
        metadata.track(PathBuf::from("/tmp/f"), 1);

        let json = serde_json::to_string(&metadata).unwrap();
        assert!(!json.contains("key_verifier"));
        let restored: VaultMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, metadata);
    }

    #[test]
    fn test_temp_state_dedup() {
        let mut state = TemporaryUnlockState::new();
        state.add(PathBuf::from("/tmp/f"));
        state.add(PathBuf::from("/tmp/f"));
        assert_eq!(state.unlocked_folders.len(), 1);

        assert!(state.remove(Path::new("/tmp/f")));
        assert!(state.is_empty());
    }
}
