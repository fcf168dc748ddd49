//! Vault manager for creating and managing profile vaults.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::conceal::{FolderConcealer, RenameConcealer};
use crate::config::VaultSettings;
use crate::layout::VaultLayout;
use crate::profile::{IntegrityReport, ProfileVault, RelockReport};
use phantomvault_common::{Error, ProfileId, Result};
use phantomvault_crypto::EncryptionEngine;

/// Summary of a maintenance pass over every profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub profiles: usize,
    /// Corrupted entries that were dropped, per profile.
    pub removed: Vec<(ProfileId, PathBuf)>,
}

/// Aggregate counts over every profile vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VaultUsage {
    pub profiles: usize,
    pub locked_folders: usize,
    /// Folders currently temporarily unlocked.
    pub exposed_folders: usize,
    pub total_bytes: u64,
}

/// Registry of profile vaults under one vault root.
///
/// Each profile is opened at most once per manager, so all callers of a
/// profile share its state lock.
pub struct VaultManager {
    settings: VaultSettings,
    engine: EncryptionEngine,
    concealer: Arc<dyn FolderConcealer>,
    vaults: RwLock<HashMap<ProfileId, Arc<ProfileVault>>>,
    engine_checked: OnceCell<()>,
}

impl VaultManager {
    /// Create a manager that hides folders by renaming them.
    ///
    /// # Errors
    /// - Invalid settings
    pub fn new(settings: VaultSettings) -> Result<Self> {
        Self::with_concealer(settings, Arc::new(RenameConcealer))
    }

    /// Create a manager with a custom hiding strategy.
    pub fn with_concealer(
        settings: VaultSettings,
        concealer: Arc<dyn FolderConcealer>,
    ) -> Result<Self> {
        settings.validate()?;
        let engine = EncryptionEngine::new().with_compression_level(settings.compression_level)?;
        Ok(Self {
            settings,
            engine,
            concealer,
            vaults: RwLock::new(HashMap::new()),
            engine_checked: OnceCell::new(),
        })
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    /// The shared encryption engine.
    pub fn engine(&self) -> &EncryptionEngine {
        &self.engine
    }

    /// Run the engine self-test once per manager.
    ///
    /// # Errors
    /// - `Crypto` if the self-test fails; no vault is opened afterwards
    pub async fn ensure_engine_ready(&self) -> Result<()> {
        self.engine_checked
            .get_or_try_init(|| async {
                let engine = self.engine.clone();
                tokio::task::spawn_blocking(move || engine.self_test())
                    .await
                    .map_err(|e| Error::Vault(format!("Self-test task failed: {}", e)))?
            })
            .await
            .map(|_| ())
    }

    fn layout(&self, profile_id: &ProfileId) -> VaultLayout {
        VaultLayout::new(&self.settings.vault_root, profile_id)
    }

    /// True if a vault directory exists for `profile_id`.
    pub fn profile_exists(&self, profile_id: &ProfileId) -> bool {
        self.layout(profile_id).metadata_file().exists()
    }

    /// Get the vault for `profile_id`, initializing it on first access.
    ///
    /// # Preconditions
    /// - The engine self-test passes (run on first call)
    pub async fn get_profile_vault(&self, profile_id: &ProfileId) -> Result<Arc<ProfileVault>> {
        if let Some(vault) = self.vaults.read().await.get(profile_id) {
            return Ok(Arc::clone(vault));
        }

        self.ensure_engine_ready().await?;

        let mut vaults = self.vaults.write().await;
        if let Some(vault) = vaults.get(profile_id) {
            return Ok(Arc::clone(vault));
        }
        let vault = Arc::new(
            ProfileVault::open(
                profile_id.clone(),
                &self.settings,
                self.engine.clone(),
                Arc::clone(&self.concealer),
            )
            .await?,
        );
        vaults.insert(profile_id.clone(), Arc::clone(&vault));
        debug!(profile = %profile_id, "Profile vault opened");
        Ok(vault)
    }

    /// Create a vault for a new profile.
    ///
    /// # Errors
    /// - `AlreadyExists` if the profile already has a vault
    pub async fn create_profile_vault(&self, profile_id: &ProfileId) -> Result<Arc<ProfileVault>> {
        if self.profile_exists(profile_id) {
            return Err(Error::AlreadyExists(format!(
                "Vault already exists for profile {}",
                profile_id
            )));
        }
        let vault = self.get_profile_vault(profile_id).await?;
        info!(profile = %profile_id, "Profile vault created");
        Ok(vault)
    }

    /// Profiles with a vault under the root, in name order.
    pub async fn list_profiles(&self) -> Result<Vec<ProfileId>> {
        let root = self.settings.vault_root.clone();
        let mut profiles = tokio::task::spawn_blocking(move || -> Result<Vec<ProfileId>> {
            if !root.exists() {
                return Ok(Vec::new());
            }
            let mut profiles = Vec::new();
            for entry in std::fs::read_dir(&root)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                match ProfileId::new(name) {
                    Ok(id) => profiles.push(id),
                    Err(_) => warn!(entry = ?entry.file_name(), "Skipping unexpected entry"),
                }
            }
            Ok(profiles)
        })
        .await
        .map_err(|e| Error::Vault(format!("Listing task failed: {}", e)))??;

        profiles.retain(|p| self.profile_exists(p));
        profiles.sort();
        Ok(profiles)
    }

    /// Open the vault of every profile under the root.
    pub async fn get_all_profile_vaults(&self) -> Result<Vec<Arc<ProfileVault>>> {
        let mut vaults = Vec::new();
        for profile in self.list_profiles().await? {
            vaults.push(self.get_profile_vault(&profile).await?);
        }
        Ok(vaults)
    }

    /// Check `master_key` against an existing profile's vault.
    ///
    /// # Errors
    /// - `NotFound` if the profile has no vault
    pub async fn verify_master_key(&self, profile_id: &ProfileId, master_key: &[u8]) -> Result<bool> {
        if !self.profile_exists(profile_id) {
            return Err(Error::NotFound(format!(
                "No vault for profile {}",
                profile_id
            )));
        }
        self.get_profile_vault(profile_id)
            .await?
            .verify_master_key(master_key)
            .await
    }

    /// Delete a profile's vault and all of its ciphertext.
    ///
    /// # Preconditions
    /// - `master_key` decrypts the vault's key verifier, or a stored file
    ///   when no verifier was enrolled
    ///
    /// # Errors
    /// - `NotFound` if the profile has no vault
    /// - `AccessDenied` for a key that fails verification
    pub async fn delete_profile_vault(&self, profile_id: &ProfileId, master_key: &[u8]) -> Result<()> {
        if master_key.is_empty() {
            return Err(Error::InvalidInput("Master key cannot be empty".to_string()));
        }
        if !self.profile_exists(profile_id) {
            return Err(Error::NotFound(format!(
                "No vault for profile {}",
                profile_id
            )));
        }

        let vault = self.get_profile_vault(profile_id).await?;
        if let Err(e) = vault.destroy(master_key).await {
            warn!(profile = %profile_id, error = %e, "Vault deletion refused");
            return Err(e);
        }

        let mut vaults = self.vaults.write().await;
        if vaults
            .get(profile_id)
            .is_some_and(|cached| Arc::ptr_eq(cached, &vault))
        {
            vaults.remove(profile_id);
        }
        drop(vaults);

        info!(profile = %profile_id, "Profile vault deleted");
        Ok(())
    }

    /// Relock temporarily unlocked folders in every profile.
    pub async fn relock_all_temporary_folders(&self) -> Result<Vec<(ProfileId, RelockReport)>> {
        let mut reports = Vec::new();
        for vault in self.get_all_profile_vaults().await? {
            if vault.temporarily_unlocked_folders().await.is_empty() {
                continue;
            }
            let report = vault.relock_temporary_folders().await?;
            reports.push((vault.profile_id().clone(), report));
        }
        Ok(reports)
    }

    /// Totals across every profile, without naming any of them.
    pub async fn usage_summary(&self) -> Result<VaultUsage> {
        let mut usage = VaultUsage::default();
        for vault in self.get_all_profile_vaults().await? {
            usage.profiles += 1;
            usage.locked_folders += vault.locked_folders().await.len();
            usage.exposed_folders += vault.temporarily_unlocked_folders().await.len();
            usage.total_bytes += vault.vault_size().await?;
        }
        Ok(usage)
    }

    /// Bytes used by all profile vaults.
    pub async fn total_vault_size(&self) -> Result<u64> {
        let mut total = 0;
        for vault in self.get_all_profile_vaults().await? {
            total += vault.vault_size().await?;
        }
        Ok(total)
    }

    /// Integrity report for every profile.
    pub async fn validate_all_vaults(&self) -> Result<Vec<(ProfileId, IntegrityReport)>> {
        let mut reports = Vec::new();
        for vault in self.get_all_profile_vaults().await? {
            let report = vault.validate_integrity().await?;
            reports.push((vault.profile_id().clone(), report));
        }
        Ok(reports)
    }

    /// Validate every vault and drop corrupted entries.
    pub async fn perform_vault_maintenance(&self) -> Result<MaintenanceReport> {
        let mut report = MaintenanceReport::default();
        for vault in self.get_all_profile_vaults().await? {
            report.profiles += 1;
            for path in vault.cleanup_corrupted_entries().await? {
                report.removed.push((vault.profile_id().clone(), path));
            }
        }
        info!(
            profiles = report.profiles,
            removed = report.removed.len(),
            "Vault maintenance complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::UnlockMode;
    use phantomvault_crypto::KeyDerivationConfig;
    use std::fs;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> VaultManager {
        let mut settings = VaultSettings::with_root(temp.path().join("vaults"));
        settings.kdf = KeyDerivationConfig::lightweight();
        VaultManager::new(settings).unwrap()
    }

    fn profile(id: &str) -> ProfileId {
        ProfileId::new(id).unwrap()
    }

    fn make_folder(temp: &TempDir, name: &str) -> PathBuf {
        let folder = temp.path().join(name);
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("a.txt"), b"alpha").unwrap();
        folder
    }

    #[tokio::test]
    async fn test_create_and_list_profiles() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        assert!(manager.list_profiles().await.unwrap().is_empty());

        manager.create_profile_vault(&profile("bob")).await.unwrap();
        manager.create_profile_vault(&profile("alice")).await.unwrap();

        assert_eq!(
            manager.list_profiles().await.unwrap(),
            vec![profile("alice"), profile("bob")]
        );
        assert!(matches!(
            manager.create_profile_vault(&profile("alice")).await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_get_profile_vault_is_shared() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        let a = manager.get_profile_vault(&profile("p1")).await.unwrap();
        let b = manager.get_profile_vault(&profile("p1")).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_delete_requires_valid_key() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let folder = make_folder(&temp, "f");

        let vault = manager.create_profile_vault(&profile("p1")).await.unwrap();
        vault.lock_folder(&folder, b"secret123").await.unwrap();

        assert!(matches!(
            manager.delete_profile_vault(&profile("p1"), b"wrong-key").await,
            Err(Error::AccessDenied(_))
        ));
        assert!(manager.profile_exists(&profile("p1")));

        manager
            .delete_profile_vault(&profile("p1"), b"secret123")
            .await
            .unwrap();
        assert!(!manager.profile_exists(&profile("p1")));
        assert!(manager.list_profiles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_invalidates_shared_handles() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let first = make_folder(&temp, "first");
        let second = make_folder(&temp, "second");

        let held = manager.create_profile_vault(&profile("p1")).await.unwrap();
        held.lock_folder(&first, b"secret123").await.unwrap();
        manager
            .delete_profile_vault(&profile("p1"), b"secret123")
            .await
            .unwrap();

        assert!(matches!(
            held.lock_folder(&second, b"secret123").await,
            Err(Error::Vault(_))
        ));
        assert!(!manager.profile_exists(&profile("p1")));
        assert!(!temp.path().join("vaults/p1").exists());
        assert!(second.join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_usage_summary_totals() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let f1 = make_folder(&temp, "one");
        let f2 = make_folder(&temp, "two");
        let f3 = make_folder(&temp, "three");

        let v1 = manager.get_profile_vault(&profile("p1")).await.unwrap();
        let v2 = manager.get_profile_vault(&profile("p2")).await.unwrap();
        v1.lock_folder(&f1, b"k1").await.unwrap();
        v1.lock_folder(&f2, b"k1").await.unwrap();
        v2.lock_folder(&f3, b"k2").await.unwrap();
        v1.unlock_folder(&f2, b"k1", UnlockMode::Temporary).await.unwrap();

        let usage = manager.usage_summary().await.unwrap();
        assert_eq!(usage.profiles, 2);
        assert_eq!(usage.locked_folders, 3);
        assert_eq!(usage.exposed_folders, 1);
        assert_eq!(usage.total_bytes, manager.total_vault_size().await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_profile() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        assert!(matches!(
            manager.delete_profile_vault(&profile("ghost"), b"secret123").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_relock_all_and_sizes() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let f1 = make_folder(&temp, "one");
        let f2 = make_folder(&temp, "two");

        let v1 = manager.get_profile_vault(&profile("p1")).await.unwrap();
        let v2 = manager.get_profile_vault(&profile("p2")).await.unwrap();
        v1.lock_folder(&f1, b"k1").await.unwrap();
        v2.lock_folder(&f2, b"k2").await.unwrap();
        v1.unlock_folder(&f1, b"k1", UnlockMode::Temporary).await.unwrap();

        let reports = manager.relock_all_temporary_folders().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, profile("p1"));
        assert!(reports[0].1.is_complete());
        assert!(!f1.exists());

        let total = manager.total_vault_size().await.unwrap();
        assert_eq!(
            total,
            v1.vault_size().await.unwrap() + v2.vault_size().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_maintenance_drops_corrupted_entries() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let folder = make_folder(&temp, "f");

        let vault = manager.get_profile_vault(&profile("p1")).await.unwrap();
        let info = vault.lock_folder(&folder, b"secret123").await.unwrap();
        fs::remove_dir_all(vault.root().join("folders").join(&info.vault_location)).unwrap();

        let reports = manager.validate_all_vaults().await.unwrap();
        assert_eq!(reports[0].1.corrupted, vec![folder.clone()]);

        let report = manager.perform_vault_maintenance().await.unwrap();
        assert_eq!(report.profiles, 1);
        assert_eq!(report.removed, vec![(profile("p1"), folder.clone())]);
        assert!(vault.locked_folders().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let temp = TempDir::new().unwrap();
        let mut settings = VaultSettings::with_root(temp.path());
        settings.compression_level = 40;
        assert!(VaultManager::new(settings).is_err());
    }
}
