//! Key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks. Cost
//! parameters are supplied by the caller on every call so production
//! vaults and test fixtures share the same code path.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::keys::{DerivedKey, Salt, KEY_LENGTH};
use phantomvault_common::{Error, Result};

/// Smallest salt Argon2 accepts.
pub const MIN_SALT_LENGTH: usize = 8;

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationConfig {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
    /// Output key length in bytes.
    pub key_length: usize,
    /// Length of the random salt generated per encryption.
    pub salt_length: usize,
}

impl KeyDerivationConfig {
    /// Create parameters suitable for interactive use.
    ///
    /// These parameters provide a balance between security and usability,
    /// targeting approximately 0.5-1 second of derivation time.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
            key_length: KEY_LENGTH,
            salt_length: 32,
        }
    }

    /// Create parameters suitable for sensitive data.
    ///
    /// Higher security parameters that may take several seconds.
    pub fn sensitive() -> Self {
        Self {
            memory_cost: 262144, // 256 MiB
            time_cost: 4,
            parallelism: 4,
            key_length: KEY_LENGTH,
            salt_length: 32,
        }
    }

    /// Create moderate parameters for constrained machines.
    pub fn moderate() -> Self {
        Self {
            memory_cost: 32768, // 32 MiB
            time_cost: 3,
            parallelism: 2,
            key_length: KEY_LENGTH,
            salt_length: 32,
        }
    }

    /// Cheap parameters used by the engine self-test and unit tests.
    pub fn lightweight() -> Self {
        Self {
            memory_cost: 8192, // 8 MiB
            time_cost: 2,
            parallelism: 1,
            key_length: KEY_LENGTH,
            salt_length: 32,
        }
    }

    /// Check the parameters before any derivation is attempted.
    ///
    /// # Errors
    /// - `InvalidInput` if a cost parameter is out of range
    /// - `Crypto` if the key length does not match the AES-256 key size
    pub fn validate(&self) -> Result<()> {
        if self.parallelism < 1 {
            return Err(Error::InvalidInput(
                "KDF parallelism must be at least 1".to_string(),
            ));
        }
        if self.time_cost < 1 {
            return Err(Error::InvalidInput(
                "KDF time cost must be at least 1".to_string(),
            ));
        }
        if self.memory_cost < 8 || self.memory_cost < 8 * self.parallelism {
            return Err(Error::InvalidInput(format!(
                "KDF memory cost must be at least 8 KiB per lane, got {} KiB",
                self.memory_cost
            )));
        }
        if self.key_length != KEY_LENGTH {
            return Err(Error::Crypto(format!(
                "Invalid key length: expected {}, got {}",
                KEY_LENGTH, self.key_length
            )));
        }
        if self.salt_length < MIN_SALT_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Salt length must be at least {} bytes",
                MIN_SALT_LENGTH
            )));
        }
        Ok(())
    }
}

impl Default for KeyDerivationConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive a symmetric key from a password and salt using Argon2id.
///
/// # Preconditions
/// - `password` must not be empty
/// - `config` must pass [`KeyDerivationConfig::validate`]
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if password is empty
/// - Returns error if Argon2id parameters are invalid
///
/// # Security
/// - Password is not stored or logged
/// - The intermediate output buffer is zeroized by `DerivedKey`
pub fn derive_key(password: &[u8], salt: &Salt, config: &KeyDerivationConfig) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }
    config.validate()?;
    if salt.len() < MIN_SALT_LENGTH {
        return Err(Error::Crypto("Salt too short".to_string()));
    }

    let params = Params::new(
        config.memory_cost,
        config.time_cost,
        config.parallelism,
        Some(config.key_length),
    )
    .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    if let Err(e) = argon2.hash_password_into(password, salt.as_bytes(), &mut key_bytes) {
        key_bytes.zeroize();
        return Err(Error::Crypto(format!("Key derivation failed: {}", e)));
    }

    // The array is Copy, so the stack original needs its own wipe.
    let key = DerivedKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}
