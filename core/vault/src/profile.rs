//! Per-profile vault: the lock/unlock state machine over folders.
//!
//! Each folder moves through
//! `Unlocked -> Locked -> TemporarilyUnlocked -> Locked`, or leaves the
//! vault via a permanent unlock. All filesystem work for a profile runs on
//! the blocking pool while that profile's state lock is held, so metadata
//! read-modify-write cycles never interleave. Different profiles proceed
//! independently.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::conceal::FolderConcealer;
use crate::config::{VaultSettings, KEY_VERIFICATION_PLAINTEXT};
use crate::envelope::{EncryptedFileRecord, SealedBlob};
use crate::layout::{
    normalize_path, path_present, read_json, remove_dir_if_exists, remove_file_if_exists,
    vault_location, write_json, VaultLayout,
};
use crate::metadata::{LockedFolderInfo, TemporaryUnlockState, VaultMetadata};
use crate::tree::{
    count_sealed_files, disk_usage, find_special_entry, first_sealed_file, open_tree, seal_tree,
};
use chrono::Utc;
use phantomvault_common::{Error, ProfileId, Result};
use phantomvault_crypto::{constant_time_compare, wipe_vec, EncryptionEngine, KeyDerivationConfig};

/// How an unlocked folder relates to the vault afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockMode {
    /// Plaintext is restored but the folder stays tracked for re-locking.
    Temporary,
    /// The folder leaves the vault and its ciphertext is deleted.
    Permanent,
}

/// Outcome of re-hiding temporarily unlocked folders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelockReport {
    pub relocked: Vec<PathBuf>,
    /// Folders that are still exposed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl RelockReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of an integrity pass over every locked folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub checked: usize,
    pub corrupted: Vec<PathBuf>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.corrupted.is_empty()
    }
}

struct VaultState {
    metadata: VaultMetadata,
    temp: TemporaryUnlockState,
    destroyed: bool,
}

struct VaultCore {
    profile_id: ProfileId,
    /// Normalized root shared by every profile.
    vault_root: PathBuf,
    layout: VaultLayout,
    engine: EncryptionEngine,
    kdf: KeyDerivationConfig,
    concealer: Arc<dyn FolderConcealer>,
}

/// Vault for a single profile.
///
/// Cloning is not supported; share it through an `Arc` so that every user
/// of a profile goes through the same state lock.
pub struct ProfileVault {
    core: Arc<VaultCore>,
    state: Arc<Mutex<VaultState>>,
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Vault(format!("Vault task failed: {}", e))
}

impl ProfileVault {
    /// Open the vault for `profile_id`, creating its directories and
    /// metadata on first use.
    ///
    /// Folders recorded in `temp_unlock.json` are tracked again, so a
    /// restart never loses sight of exposed folders.
    ///
    /// # Errors
    /// - `Vault` if the on-disk format version is incompatible
    /// - `Integrity` if the metadata names a different profile
    /// - `Io` / `Serialization` on unreadable state
    pub async fn open(
        profile_id: ProfileId,
        settings: &VaultSettings,
        engine: EncryptionEngine,
        concealer: Arc<dyn FolderConcealer>,
    ) -> Result<Self> {
        let core = Arc::new(VaultCore {
            vault_root: normalize_path(&settings.vault_root)?,
            layout: VaultLayout::new(&settings.vault_root, &profile_id),
            profile_id,
            engine,
            kdf: settings.kdf.clone(),
            concealer,
        });

        let loader = Arc::clone(&core);
        let state = tokio::task::spawn_blocking(move || loader.load_state())
            .await
            .map_err(join_error)??;

        Ok(Self {
            core,
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn profile_id(&self) -> &ProfileId {
        &self.core.profile_id
    }

    /// Profile directory inside the vault root.
    pub fn root(&self) -> &Path {
        self.core.layout.root()
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&VaultCore, &mut VaultState) -> Result<T> + Send + 'static,
    {
        let mut guard = Arc::clone(&self.state).lock_owned().await;
        if guard.destroyed {
            return Err(Error::Vault(format!(
                "Vault for profile {} has been deleted",
                self.core.profile_id
            )));
        }
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || op(&*core, &mut *guard))
            .await
            .map_err(join_error)?
    }

    /// Encrypt `path` into the vault and hide the original.
    ///
    /// # Preconditions
    /// - `path` is an existing directory that is not already locked
    /// - `master_key` is non-empty and matches the vault's key verifier,
    ///   if one has been enrolled
    ///
    /// # Postconditions
    /// - On success the folder is tracked, its ciphertext and metadata are
    ///   on disk, and nothing remains at `path`
    /// - On failure the vault holds no trace of the folder and `path` is
    ///   untouched
    ///
    /// # Errors
    /// - `InvalidInput`, `NotFound`, `AlreadyExists` for rejected input
    /// - `AccessDenied` for a key that fails verification
    /// - Any crypto or I/O failure, after rollback
    pub async fn lock_folder(
        &self,
        path: impl AsRef<Path>,
        master_key: &[u8],
    ) -> Result<LockedFolderInfo> {
        let path = path.as_ref().to_path_buf();
        let key = Zeroizing::new(master_key.to_vec());
        self.run(move |core, state| core.lock(state, &path, &key))
            .await
    }

    /// Decrypt a locked folder back to its original location.
    ///
    /// Plaintext is first written to a sibling staging directory and then
    /// renamed into place, so a failed unlock leaves nothing behind.
    ///
    /// # Errors
    /// - `NotFound` if the folder is not locked
    /// - `AlreadyExists` if the original location is occupied, or for a
    ///   temporary unlock of a folder that is already exposed
    /// - `AccessDenied` for a key that fails verification
    /// - `Integrity` on checksum mismatch
    pub async fn unlock_folder(
        &self,
        path: impl AsRef<Path>,
        master_key: &[u8],
        mode: UnlockMode,
    ) -> Result<LockedFolderInfo> {
        let path = path.as_ref().to_path_buf();
        let key = Zeroizing::new(master_key.to_vec());
        self.run(move |core, state| core.unlock(state, &path, &key, mode))
            .await
    }

    /// Hide every temporarily unlocked folder again.
    ///
    /// Folders that fail stay tracked and are listed in the report; the
    /// temporary-unlock file is removed only when nothing is left exposed.
    pub async fn relock_temporary_folders(&self) -> Result<RelockReport> {
        self.run(|core, state| core.relock(state)).await
    }

    /// Check every locked folder's ciphertext against its metadata.
    pub async fn validate_integrity(&self) -> Result<IntegrityReport> {
        self.run(|core, state| Ok(core.check_integrity(state))).await
    }

    /// Drop corrupted entries from tracking and delete their ciphertext.
    ///
    /// Returns the folders that were removed.
    pub async fn cleanup_corrupted_entries(&self) -> Result<Vec<PathBuf>> {
        self.run(|core, state| core.cleanup(state)).await
    }

    /// Check `master_key` against the vault.
    ///
    /// Uses the enrolled key verifier, or a trial decryption of one stored
    /// file for vaults without one. An empty vault with no verifier accepts
    /// any key.
    pub async fn verify_master_key(&self, master_key: &[u8]) -> Result<bool> {
        let key = Zeroizing::new(master_key.to_vec());
        self.run(move |core, state| core.check_master_key(&state.metadata, &key))
            .await
    }

    /// Verify `master_key` and delete the whole profile directory.
    ///
    /// Runs under the state lock, so no lock or unlock can be in flight.
    /// Every later operation on this handle fails with `Vault`.
    ///
    /// # Errors
    /// - `AccessDenied` for a key that fails verification
    pub async fn destroy(&self, master_key: &[u8]) -> Result<()> {
        let key = Zeroizing::new(master_key.to_vec());
        self.run(move |core, state| {
            core.require_master_key(&state.metadata, &key)?;
            if !state.temp.is_empty() {
                warn!(
                    profile = %core.profile_id,
                    folders = state.temp.unlocked_folders.len(),
                    "Deleting vault with exposed folders"
                );
            }
            remove_dir_if_exists(core.layout.root())?;
            state.destroyed = true;
            Ok(())
        })
        .await
    }

    pub async fn locked_folders(&self) -> Vec<PathBuf> {
        let state = self.state.lock().await;
        state.metadata.locked_folders.iter().cloned().collect()
    }

    pub async fn temporarily_unlocked_folders(&self) -> Vec<PathBuf> {
        self.state.lock().await.temp.unlocked_folders.clone()
    }

    pub async fn is_folder_locked(&self, path: impl AsRef<Path>) -> bool {
        let Ok(path) = normalize_path(path.as_ref()) else {
            return false;
        };
        self.state.lock().await.metadata.is_tracked(&path)
    }

    pub async fn is_temporarily_unlocked(&self, path: impl AsRef<Path>) -> bool {
        let Ok(path) = normalize_path(path.as_ref()) else {
            return false;
        };
        self.state.lock().await.temp.contains(&path)
    }

    /// Stored metadata for one locked folder.
    pub async fn folder_info(&self, path: impl AsRef<Path>) -> Result<LockedFolderInfo> {
        let path = normalize_path(path.as_ref())?;
        self.run(move |core, state| {
            if !state.metadata.is_tracked(&path) {
                return Err(Error::NotFound(format!(
                    "Folder is not locked: {}",
                    path.display()
                )));
            }
            core.load_info(&vault_location(&path))
        })
        .await
    }

    /// Snapshot of the vault metadata.
    pub async fn metadata(&self) -> VaultMetadata {
        self.state.lock().await.metadata.clone()
    }

    /// Bytes used by this profile's vault directory.
    pub async fn vault_size(&self) -> Result<u64> {
        self.run(|core, _| disk_usage(core.layout.root())).await
    }
}

impl VaultCore {
    fn load_state(&self) -> Result<VaultState> {
        self.layout.create()?;

        let metadata_file = self.layout.metadata_file();
        let metadata = if metadata_file.exists() {
            let metadata: VaultMetadata = read_json(&metadata_file)?;
            if !metadata.vault_version.is_compatible() {
                return Err(Error::Vault(format!(
                    "Incompatible vault version {}.{}",
                    metadata.vault_version.major, metadata.vault_version.minor
                )));
            }
            if metadata.profile_id != self.profile_id {
                return Err(Error::Integrity(
                    "Vault metadata belongs to a different profile".to_string(),
                ));
            }
            metadata
        } else {
            let metadata = VaultMetadata::new(self.profile_id.clone());
            write_json(&metadata_file, &metadata)?;
            info!(profile = %self.profile_id, "Profile vault initialized");
            metadata
        };

        let temp_file = self.layout.temp_unlock_file();
        let temp = if temp_file.exists() {
            let temp: TemporaryUnlockState = read_json(&temp_file)?;
            if !temp.is_empty() {
                warn!(
                    profile = %self.profile_id,
                    folders = temp.unlocked_folders.len(),
                    "Recovered temporarily unlocked folders"
                );
            }
            temp
        } else {
            TemporaryUnlockState::new()
        };

        debug!(
            profile = %self.profile_id,
            folders = metadata.total_folders,
            "Profile vault loaded"
        );
        Ok(VaultState {
            metadata,
            temp,
            destroyed: false,
        })
    }

    fn save_metadata(&self, metadata: &VaultMetadata) -> Result<()> {
        write_json(&self.layout.metadata_file(), metadata)
    }

    fn save_temp(&self, temp: &TemporaryUnlockState) -> Result<()> {
        let file = self.layout.temp_unlock_file();
        if temp.is_empty() {
            remove_file_if_exists(&file)
        } else {
            write_json(&file, temp)
        }
    }

    fn load_info(&self, location: &str) -> Result<LockedFolderInfo> {
        let file = self.layout.folder_metadata_file(location);
        if !file.exists() {
            return Err(Error::Integrity(
                "Folder metadata missing from vault".to_string(),
            ));
        }
        read_json(&file)
    }

    fn save_info(&self, info: &LockedFolderInfo) -> Result<()> {
        write_json(
            &self.layout.folder_metadata_file(&info.vault_location),
            info,
        )
    }

    fn check_master_key(&self, metadata: &VaultMetadata, master_key: &[u8]) -> Result<bool> {
        if master_key.is_empty() {
            return Ok(false);
        }

        if let Some(verifier) = &metadata.key_verifier {
            return match verifier.open(&self.engine, master_key) {
                Ok(mut plaintext) => {
                    let matches = constant_time_compare(&plaintext, KEY_VERIFICATION_PLAINTEXT);
                    wipe_vec(&mut plaintext);
                    Ok(matches)
                }
                Err(Error::Crypto(_)) | Err(Error::Integrity(_)) => Ok(false),
                Err(e) => Err(e),
            };
        }

        let Some(sample) = first_sealed_file(&self.layout.folders_dir())? else {
            return Ok(true);
        };
        let record = EncryptedFileRecord::read(&sample)?;
        match record.blob.open(&self.engine, master_key) {
            Ok(mut plaintext) => {
                wipe_vec(&mut plaintext);
                Ok(true)
            }
            Err(Error::Crypto(_)) | Err(Error::Integrity(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn require_master_key(&self, metadata: &VaultMetadata, master_key: &[u8]) -> Result<()> {
        if self.check_master_key(metadata, master_key)? {
            Ok(())
        } else {
            warn!(profile = %self.profile_id, "Master key verification failed");
            Err(Error::AccessDenied(
                "Master key verification failed".to_string(),
            ))
        }
    }

    fn lock(
        &self,
        state: &mut VaultState,
        path: &Path,
        master_key: &[u8],
    ) -> Result<LockedFolderInfo> {
        if master_key.is_empty() {
            return Err(Error::InvalidInput("Master key cannot be empty".to_string()));
        }
        let path = normalize_path(path)?;
        let source = fs::symlink_metadata(&path)
            .map_err(|_| Error::NotFound(format!("Folder not found: {}", path.display())))?;
        if !source.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Not a directory: {}",
                path.display()
            )));
        }
        if self.overlaps_vault(&path) {
            return Err(Error::InvalidInput(format!(
                "Folder overlaps the vault directory: {}",
                path.display()
            )));
        }
        if state.metadata.is_tracked(&path) {
            return Err(Error::AlreadyExists(format!(
                "Folder is already locked: {}",
                path.display()
            )));
        }
        if let Some(entry) = find_special_entry(&path)? {
            return Err(Error::InvalidInput(format!(
                "Folder contains a symlink or special file: {}",
                entry.display()
            )));
        }
        self.require_master_key(&state.metadata, master_key)?;

        let location = vault_location(&path);
        let folder_dir = self.layout.folder_dir(&location);
        let info_file = self.layout.folder_metadata_file(&location);
        remove_dir_if_exists(&folder_dir)?;

        info!(profile = %self.profile_id, location = %location, "Locking folder");

        let mut metadata = state.metadata.clone();
        let staged = (|| -> Result<LockedFolderInfo> {
            let summary = seal_tree(&self.engine, &path, &folder_dir, master_key, &self.kdf)?;
            let info = LockedFolderInfo {
                original_path: path.clone(),
                vault_location: location.clone(),
                lock_timestamp: Utc::now(),
                file_count: summary.file_count,
                total_size: summary.total_size,
                is_temporarily_unlocked: false,
            };
            self.save_info(&info)?;

            if metadata.key_verifier.is_none() {
                metadata.key_verifier = Some(SealedBlob::seal(
                    &self.engine,
                    KEY_VERIFICATION_PLAINTEXT,
                    master_key,
                    &self.kdf,
                )?);
            }
            metadata.track(path.clone(), summary.file_count);
            self.save_metadata(&metadata)?;

            self.concealer.hide(&path)?;
            Ok(info)
        })();

        match staged {
            Ok(info) => {
                state.metadata = metadata;
                info!(
                    profile = %self.profile_id,
                    files = info.file_count,
                    bytes = info.total_size,
                    "Folder locked"
                );
                Ok(info)
            }
            Err(e) => {
                warn!(profile = %self.profile_id, error = %e, "Lock failed, rolling back");
                self.rollback_lock(&state.metadata, &folder_dir, &info_file);
                Err(e)
            }
        }
    }

    fn overlaps_vault(&self, path: &Path) -> bool {
        let overlap = |a: &Path, b: &Path| a.starts_with(b) || b.starts_with(a);
        if overlap(path, &self.vault_root) {
            return true;
        }
        // Catch aliases through symlinked parents.
        match (fs::canonicalize(path), fs::canonicalize(&self.vault_root)) {
            (Ok(path), Ok(root)) => overlap(&path, &root),
            _ => false,
        }
    }

    fn rollback_lock(&self, previous: &VaultMetadata, folder_dir: &Path, info_file: &Path) {
        if let Err(e) = remove_dir_if_exists(folder_dir) {
            error!(error = %e, "Failed to remove ciphertext during rollback");
        }
        if let Err(e) = remove_file_if_exists(info_file) {
            error!(error = %e, "Failed to remove folder metadata during rollback");
        }
        if let Err(e) = self.save_metadata(previous) {
            error!(error = %e, "Failed to restore vault metadata during rollback");
        }
    }

    fn unlock(
        &self,
        state: &mut VaultState,
        path: &Path,
        master_key: &[u8],
        mode: UnlockMode,
    ) -> Result<LockedFolderInfo> {
        if master_key.is_empty() {
            return Err(Error::InvalidInput("Master key cannot be empty".to_string()));
        }
        let path = normalize_path(path)?;
        if !state.metadata.is_tracked(&path) {
            return Err(Error::NotFound(format!(
                "Folder is not locked: {}",
                path.display()
            )));
        }
        self.require_master_key(&state.metadata, master_key)?;

        let location = vault_location(&path);
        let mut info = self.load_info(&location)?;
        let exposed = state.temp.contains(&path);

        match (mode, exposed) {
            (UnlockMode::Temporary, true) => {
                return Err(Error::AlreadyExists(format!(
                    "Folder is already temporarily unlocked: {}",
                    path.display()
                )));
            }
            (UnlockMode::Permanent, true) => {
                // Plaintext is already in place; only the vault side goes.
                self.forget_folder(state, &path, &info)?;
                info.is_temporarily_unlocked = false;
                info!(profile = %self.profile_id, "Exposed folder released permanently");
                return Ok(info);
            }
            _ => {}
        }

        if path_present(&path) {
            return Err(Error::AlreadyExists(format!(
                "Original location is occupied: {}",
                path.display()
            )));
        }

        self.restore(&location, &path, master_key)?;

        match mode {
            UnlockMode::Temporary => {
                let mut temp = state.temp.clone();
                temp.add(path.clone());
                info.is_temporarily_unlocked = true;

                let persisted = self.save_temp(&temp).and_then(|()| self.save_info(&info));
                if let Err(e) = persisted {
                    // Ciphertext is still in the vault.
                    error!(error = %e, "Failed to record temporary unlock");
                    if let Err(e) = remove_dir_if_exists(&path) {
                        error!(error = %e, "Failed to remove restored plaintext");
                    }
                    if let Err(e) = self.save_temp(&state.temp) {
                        error!(error = %e, "Failed to restore temporary unlock state");
                    }
                    return Err(e);
                }
                state.temp = temp;
                info!(profile = %self.profile_id, "Folder temporarily unlocked");
            }
            UnlockMode::Permanent => {
                self.forget_folder(state, &path, &info)?;
                info!(profile = %self.profile_id, "Folder permanently unlocked");
            }
        }
        Ok(info)
    }

    fn restore(&self, location: &str, path: &Path, master_key: &[u8]) -> Result<()> {
        let name = path.file_name().ok_or_else(|| {
            Error::InvalidInput(format!("Cannot restore {}", path.display()))
        })?;
        let staging = path.with_file_name(format!(
            ".{}.phantomvault_staging_{}",
            name.to_string_lossy(),
            Uuid::new_v4()
        ));

        let restored = open_tree(
            &self.engine,
            &self.layout.folder_dir(location),
            &staging,
            master_key,
        )
        .and_then(|_| fs::rename(&staging, path).map_err(Error::from));

        if restored.is_err() {
            if let Err(e) = remove_dir_if_exists(&staging) {
                error!(error = %e, "Failed to remove staging directory");
            }
        }
        restored
    }

    fn forget_folder(
        &self,
        state: &mut VaultState,
        path: &Path,
        info: &LockedFolderInfo,
    ) -> Result<()> {
        let mut metadata = state.metadata.clone();
        metadata.untrack(path, info.file_count);
        self.save_metadata(&metadata)?;
        state.metadata = metadata;

        let mut temp = state.temp.clone();
        if temp.remove(path) {
            self.save_temp(&temp)?;
            state.temp = temp;
        }

        remove_dir_if_exists(&self.layout.folder_dir(&info.vault_location))?;
        remove_file_if_exists(&self.layout.folder_metadata_file(&info.vault_location))?;
        self.concealer.discard_hidden(path)
    }

    fn relock(&self, state: &mut VaultState) -> Result<RelockReport> {
        let mut report = RelockReport::default();

        for path in &state.temp.unlocked_folders {
            let hidden = if path_present(path) {
                self.concealer.hide(path).map(|_| ())
            } else {
                debug!(path = %path.display(), "Exposed folder already gone");
                Ok(())
            };
            match hidden {
                Ok(()) => report.relocked.push(path.clone()),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to re-hide folder");
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        for path in &report.relocked {
            let updated = self.load_info(&vault_location(path)).and_then(|mut info| {
                info.is_temporarily_unlocked = false;
                self.save_info(&info)
            });
            if let Err(e) = updated {
                warn!(path = %path.display(), error = %e, "Failed to update folder metadata");
            }
        }

        let mut temp = state.temp.clone();
        for path in &report.relocked {
            temp.remove(path);
        }
        self.save_temp(&temp)?;
        state.temp = temp;

        info!(
            profile = %self.profile_id,
            relocked = report.relocked.len(),
            failed = report.failed.len(),
            "Temporary folders relocked"
        );
        Ok(report)
    }

    fn entry_fault(&self, path: &Path) -> Option<String> {
        let location = vault_location(path);
        let folder_dir = self.layout.folder_dir(&location);
        if !folder_dir.is_dir() {
            return Some("ciphertext directory missing".to_string());
        }
        let info = match self.load_info(&location) {
            Ok(info) => info,
            Err(e) => return Some(e.to_string()),
        };
        match count_sealed_files(&folder_dir) {
            Ok(count) if count == info.file_count => None,
            Ok(count) => Some(format!(
                "expected {} files, found {}",
                info.file_count, count
            )),
            Err(e) => Some(e.to_string()),
        }
    }

    fn check_integrity(&self, state: &VaultState) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        for path in &state.metadata.locked_folders {
            report.checked += 1;
            if let Some(fault) = self.entry_fault(path) {
                warn!(
                    profile = %self.profile_id,
                    path = %path.display(),
                    fault = %fault,
                    "Corrupted vault entry"
                );
                report.corrupted.push(path.clone());
            }
        }
        report
    }

    fn cleanup(&self, state: &mut VaultState) -> Result<Vec<PathBuf>> {
        let report = self.check_integrity(state);
        if report.is_healthy() {
            return Ok(Vec::new());
        }

        let mut metadata = state.metadata.clone();
        let mut temp = state.temp.clone();
        for path in &report.corrupted {
            let location = vault_location(path);
            let file_count = self.load_info(&location).map(|i| i.file_count).unwrap_or(0);
            metadata.untrack(path, file_count);
            temp.remove(path);
        }
        self.save_metadata(&metadata)?;
        self.save_temp(&temp)?;
        state.metadata = metadata;
        state.temp = temp;

        for path in &report.corrupted {
            let location = vault_location(path);
            remove_dir_if_exists(&self.layout.folder_dir(&location))?;
            remove_file_if_exists(&self.layout.folder_metadata_file(&location))?;
        }

        info!(
            profile = %self.profile_id,
            removed = report.corrupted.len(),
            "Corrupted vault entries removed"
        );
        Ok(report.corrupted)
    }
}
