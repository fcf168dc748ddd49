//! Vault configuration and on-disk naming.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use phantomvault_common::{Error, Result};
use phantomvault_crypto::{compress, KeyDerivationConfig};

/// Vault format version for migration support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultVersion {
    pub major: u32,
    pub minor: u32,
}

impl VaultVersion {
    /// Current vault format version.
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    /// Check if this version is compatible with the current version.
    pub fn is_compatible(&self) -> bool {
        self.major == Self::CURRENT.major
    }
}

impl Default for VaultVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Settings shared by every profile vault under one root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Directory holding one subdirectory per profile.
    pub vault_root: PathBuf,
    /// KDF parameters used when sealing new files.
    pub kdf: KeyDerivationConfig,
    /// zstd level applied before encryption.
    pub compression_level: i32,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            vault_root: default_vault_root(),
            kdf: KeyDerivationConfig::default(),
            compression_level: compress::DEFAULT_LEVEL,
        }
    }
}

impl VaultSettings {
    /// Settings rooted at `vault_root` with default parameters.
    pub fn with_root(vault_root: impl Into<PathBuf>) -> Self {
        Self {
            vault_root: vault_root.into(),
            ..Self::default()
        }
    }

    /// Check the settings before any vault is opened with them.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty root or an out-of-range compression level
    /// - Any KDF validation error
    pub fn validate(&self) -> Result<()> {
        if self.vault_root.as_os_str().is_empty() {
            return Err(Error::InvalidInput("Vault root cannot be empty".to_string()));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(Error::InvalidInput(
                "Invalid compression level (must be 1-22)".to_string(),
            ));
        }
        self.kdf.validate()
    }
}

/// Platform data directory joined with `phantomvault/vaults`.
pub fn default_vault_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phantomvault")
        .join("vaults")
}

/// Vault metadata file in each profile directory.
pub const METADATA_FILENAME: &str = "vault_metadata.json";

/// Temporary-unlock tracking file in each profile directory.
pub const TEMP_UNLOCK_FILENAME: &str = "temp_unlock.json";

/// Encrypted folder trees, one per vault location.
pub const FOLDERS_DIRNAME: &str = "folders";

/// Per-folder metadata, one JSON file per vault location.
pub const META_DIRNAME: &str = "metadata";

/// Scratch space for atomic writes.
pub const TEMP_DIRNAME: &str = "temp";

/// Extension appended to every sealed file.
pub const ENCRYPTED_EXTENSION: &str = "enc";

/// Suffix of a hidden original folder.
pub const HIDDEN_SUFFIX: &str = ".phantomvault_hidden";

/// Known plaintext sealed under the master key to verify it later.
pub const KEY_VERIFICATION_PLAINTEXT: &[u8] = b"PHANTOMVAULT_KEY_VERIFICATION_V1";
