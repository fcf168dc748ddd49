//! The encryption engine: compress-then-encrypt with a per-call salt and IV.
//!
//! The engine is stateless per call. The only shared state is the optional
//! statistics block, which is made of atomics and can be shared freely
//! between threads.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aead::{self, decrypt_with_iv, encrypt_with_iv, generate_iv};
use crate::compress::{self, CompressionAlgorithm};
use crate::kdf::{derive_key, KeyDerivationConfig};
use crate::keys::{generate_random_bytes, Salt};
use crate::memory::wipe_vec;
use phantomvault_common::{Error, Result};

/// Output of a single [`EncryptionEngine::encrypt`] call.
///
/// Holds everything needed to decrypt except the password and KDF
/// parameters. Contains no plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionResult {
    /// Ciphertext followed by the authentication tag.
    pub encrypted_data: Vec<u8>,
    /// AES-GCM nonce.
    pub iv: Vec<u8>,
    /// Argon2id salt.
    pub salt: Salt,
    /// Plaintext length before compression.
    pub original_size: usize,
    /// Length of the buffer that was actually encrypted.
    pub compressed_size: usize,
    /// Compression applied before encryption.
    pub compression_algorithm: CompressionAlgorithm,
    /// Cipher label.
    pub algorithm: String,
}

/// Optional engine counters.
#[derive(Debug, Default)]
pub struct EngineStats {
    encryptions: AtomicU64,
    decryptions: AtomicU64,
    failures: AtomicU64,
    bytes_encrypted: AtomicU64,
    bytes_decrypted: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatsSnapshot {
    pub encryptions: u64,
    pub decryptions: u64,
    pub failures: u64,
    pub bytes_encrypted: u64,
    pub bytes_decrypted: u64,
}

impl EngineStats {
    /// Read all counters.
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            encryptions: self.encryptions.load(Ordering::Relaxed),
            decryptions: self.decryptions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_encrypted: self.bytes_encrypted.load(Ordering::Relaxed),
            bytes_decrypted: self.bytes_decrypted.load(Ordering::Relaxed),
        }
    }
}

/// Encryption engine.
///
/// Cloning is cheap; clones share the statistics block if one is enabled.
#[derive(Debug, Clone)]
pub struct EncryptionEngine {
    compression_level: i32,
    stats: Option<Arc<EngineStats>>,
}

impl Default for EncryptionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionEngine {
    /// Create an engine with the default compression level and no counters.
    pub fn new() -> Self {
        Self {
            compression_level: compress::DEFAULT_LEVEL,
            stats: None,
        }
    }

    /// Use a specific zstd level (1..=22).
    pub fn with_compression_level(mut self, level: i32) -> Result<Self> {
        if !(1..=22).contains(&level) {
            return Err(Error::InvalidInput(
                "Invalid compression level (must be 1-22)".to_string(),
            ));
        }
        self.compression_level = level;
        Ok(self)
    }

    /// Enable the performance counters.
    pub fn with_stats(mut self) -> Self {
        self.stats = Some(Arc::new(EngineStats::default()));
        self
    }

    /// Counters, if enabled.
    pub fn stats(&self) -> Option<EngineStatsSnapshot> {
        self.stats.as_ref().map(|s| s.snapshot())
    }

    fn record<T>(&self, outcome: &Result<T>, op: &Direction, bytes: usize) {
        let Some(stats) = &self.stats else { return };
        match outcome {
            Ok(_) => {
                let (count, total) = match op {
                    Direction::Encrypt => (&stats.encryptions, &stats.bytes_encrypted),
                    Direction::Decrypt => (&stats.decryptions, &stats.bytes_decrypted),
                };
                count.fetch_add(1, Ordering::Relaxed);
                total.fetch_add(bytes as u64, Ordering::Relaxed);
            }
            Err(_) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Compress, then encrypt `plaintext` under a key derived from `password`.
    ///
    /// # Postconditions
    /// - A fresh salt and IV are generated for every call
    /// - `original_size` and `compressed_size` describe the buffers exactly
    /// - Intermediate compressed and key buffers are wiped before returning
    ///
    /// # Errors
    /// - `InvalidInput` for an empty password or invalid config
    /// - `Crypto` if random generation, key derivation or encryption fails
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        password: &[u8],
        config: &KeyDerivationConfig,
    ) -> Result<EncryptionResult> {
        let outcome = self.encrypt_inner(plaintext, password, config);
        self.record(&outcome, &Direction::Encrypt, plaintext.len());
        outcome
    }

    fn encrypt_inner(
        &self,
        plaintext: &[u8],
        password: &[u8],
        config: &KeyDerivationConfig,
    ) -> Result<EncryptionResult> {
        if password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }
        config.validate()?;

        let salt = Salt::generate(config.salt_length)?;
        let iv = generate_iv()?;
        let mut key = derive_key(password, &salt, config)?;

        let (mut buffer, compression_algorithm) = self.compress_for_storage(plaintext);
        let compressed_size = buffer.len();

        let sealed = encrypt_with_iv(key.as_bytes(), &iv, &buffer);

        wipe_vec(&mut buffer);
        key.wipe();

        let encrypted_data = sealed?;
        debug!(
            original = plaintext.len(),
            stored = compressed_size,
            compression = %compression_algorithm,
            "Payload encrypted"
        );

        Ok(EncryptionResult {
            encrypted_data,
            iv,
            salt,
            original_size: plaintext.len(),
            compressed_size,
            compression_algorithm,
            algorithm: aead::ALGORITHM.to_string(),
        })
    }

    fn compress_for_storage(&self, plaintext: &[u8]) -> (Vec<u8>, CompressionAlgorithm) {
        if plaintext.is_empty() {
            return (Vec::new(), CompressionAlgorithm::None);
        }
        match compress::compress(plaintext, self.compression_level) {
            Ok(compressed) if compressed.len() < plaintext.len() => {
                (compressed, CompressionAlgorithm::Zstd)
            }
            Ok(mut expanded) => {
                wipe_vec(&mut expanded);
                (plaintext.to_vec(), CompressionAlgorithm::None)
            }
            Err(e) => {
                warn!(error = %e, "Compression failed, storing uncompressed");
                (plaintext.to_vec(), CompressionAlgorithm::None)
            }
        }
    }

    /// Re-derive the key from the stored salt, decrypt, then decompress.
    ///
    /// # Errors
    /// - `Crypto` on a wrong password or tampered ciphertext
    /// - `Integrity` if the recovered plaintext is not `original_size` bytes
    pub fn decrypt(
        &self,
        sealed: &EncryptionResult,
        password: &[u8],
        config: &KeyDerivationConfig,
    ) -> Result<Vec<u8>> {
        let outcome = self.decrypt_inner(sealed, password, config);
        self.record(&outcome, &Direction::Decrypt, sealed.original_size);
        outcome
    }

    fn decrypt_inner(
        &self,
        sealed: &EncryptionResult,
        password: &[u8],
        config: &KeyDerivationConfig,
    ) -> Result<Vec<u8>> {
        let mut key = derive_key(password, &sealed.salt, config)?;
        let opened = decrypt_with_iv(key.as_bytes(), &sealed.iv, &sealed.encrypted_data);
        key.wipe();
        let mut decrypted = opened?;

        match sealed.compression_algorithm {
            CompressionAlgorithm::None => {
                if decrypted.len() != sealed.original_size {
                    wipe_vec(&mut decrypted);
                    return Err(Error::Integrity(
                        "Decrypted size does not match recorded size".to_string(),
                    ));
                }
                Ok(decrypted)
            }
            CompressionAlgorithm::Zstd => {
                let restored = compress::decompress(&decrypted, sealed.original_size);
                wipe_vec(&mut decrypted);
                restored
            }
        }
    }

    /// Run the start-up self-test.
    ///
    /// Checks that key derivation is deterministic, that a full
    /// encrypt/decrypt round-trip restores the input, and that the random
    /// source does not repeat itself.
    ///
    /// # Errors
    /// - `Crypto` naming the failed check. A vault must not operate on an
    ///   engine that returned an error here.
    pub fn self_test(&self) -> Result<()> {
        let config = KeyDerivationConfig::lightweight();
        let password = b"self-test-password";
        let salt = Salt::generate(config.salt_length)
            .map_err(|_| Error::Crypto("Self-test failed: cannot generate salt".to_string()))?;

        let key1 = derive_key(password, &salt, &config)?;
        let key2 = derive_key(password, &salt, &config)?;
        if !crate::memory::constant_time_compare(key1.as_bytes(), key2.as_bytes()) {
            return Err(Error::Crypto(
                "Self-test failed: key derivation inconsistent".to_string(),
            ));
        }

        let sample = b"This is a test message for encryption validation.".repeat(4);
        let sealed = self
            .encrypt(&sample, password, &config)
            .map_err(|e| Error::Crypto(format!("Self-test failed: encryption failed ({})", e)))?;
        let restored = self
            .decrypt(&sealed, password, &config)
            .map_err(|e| Error::Crypto(format!("Self-test failed: decryption failed ({})", e)))?;
        if restored != sample {
            return Err(Error::Crypto(
                "Self-test failed: round-trip data mismatch".to_string(),
            ));
        }
        if self.decrypt(&sealed, b"wrong-password", &config).is_ok() {
            return Err(Error::Crypto(
                "Self-test failed: wrong password was accepted".to_string(),
            ));
        }

        let random1 = generate_random_bytes(32)?;
        let random2 = generate_random_bytes(32)?;
        if random1 == random2 {
            return Err(Error::Crypto(
                "Self-test failed: random number generation repeated".to_string(),
            ));
        }

        info!("Encryption engine self-test passed");
        Ok(())
    }
}

enum Direction {
    Encrypt,
    Decrypt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> KeyDerivationConfig {
        KeyDerivationConfig::lightweight()
    }

    #[test]
    fn test_roundtrip_compressible() {
        let engine = EncryptionEngine::new();
        let plaintext = b"compressible ".repeat(200);

        let sealed = engine.encrypt(&plaintext, b"secret123", &config()).unwrap();
        assert_eq!(sealed.compression_algorithm, CompressionAlgorithm::Zstd);
        assert_eq!(sealed.original_size, plaintext.len());
        assert!(sealed.compressed_size < plaintext.len());
        assert_eq!(sealed.algorithm, "AES-256-GCM");

        let restored = engine.decrypt(&sealed, b"secret123", &config()).unwrap();
        assert_eq!(restored, plaintext);
    }

    #[test]
    fn test_incompressible_is_stored_raw() {
        let engine = EncryptionEngine::new();
        let plaintext = generate_random_bytes(64).unwrap();

        let sealed = engine.encrypt(&plaintext, b"secret123", &config()).unwrap();
        assert_eq!(sealed.compression_algorithm, CompressionAlgorithm::None);
        assert_eq!(sealed.compressed_size, plaintext.len());

        let restored = engine.decrypt(&sealed, b"secret123", &config()).unwrap();
        assert_eq!(restored, plaintext);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let engine = EncryptionEngine::new();
        let sealed = engine.encrypt(b"", b"secret123", &config()).unwrap();
        assert_eq!(sealed.original_size, 0);
        assert!(engine.decrypt(&sealed, b"secret123", &config()).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_salt_and_iv_per_call() {
        let engine = EncryptionEngine::new();
        let a = engine.encrypt(b"same input", b"secret123", &config()).unwrap();
        let b = engine.encrypt(b"same input", b"secret123", &config()).unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.encrypted_data, b.encrypted_data);
    }

    #[test]
    fn test_wrong_password_fails() {
        let engine = EncryptionEngine::new();
        let sealed = engine.encrypt(b"data", b"secret123", &config()).unwrap();
        assert!(matches!(
            engine.decrypt(&sealed, b"secret124", &config()),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn test_recorded_size_mismatch_is_integrity_failure() {
        let engine = EncryptionEngine::new();
        let mut sealed = engine
            .encrypt(&b"abc".repeat(100), b"secret123", &config())
            .unwrap();
        sealed.original_size += 1;

        assert!(matches!(
            engine.decrypt(&sealed, b"secret123", &config()),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn test_errors_do_not_leak_password() {
        let engine = EncryptionEngine::new();
        let sealed = engine.encrypt(b"data", b"secret123", &config()).unwrap();
        let err = engine
            .decrypt(&sealed, b"p@ssw0rd-guess", &config())
            .unwrap_err();
        assert!(!err.to_string().contains("p@ssw0rd-guess"));
    }

    #[test]
    fn test_empty_password_rejected() {
        let engine = EncryptionEngine::new();
        assert!(matches!(
            engine.encrypt(b"data", b"", &config()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_self_test_passes() {
        EncryptionEngine::new().self_test().unwrap();
    }

    #[test]
    fn test_stats_disabled_by_default() {
        let engine = EncryptionEngine::new();
        engine.encrypt(b"data", b"secret123", &config()).unwrap();
        assert!(engine.stats().is_none());
    }

    #[test]
    fn test_stats_counts_operations() {
        let engine = EncryptionEngine::new().with_stats();
        let sealed = engine.encrypt(b"abcdef", b"secret123", &config()).unwrap();
        engine.decrypt(&sealed, b"secret123", &config()).unwrap();
        let _ = engine.decrypt(&sealed, b"wrong", &config());

        let stats = engine.stats().unwrap();
        assert_eq!(stats.encryptions, 1);
        assert_eq!(stats.decryptions, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.bytes_encrypted, 6);
    }

    #[test]
    fn test_invalid_compression_level() {
        assert!(EncryptionEngine::new().with_compression_level(0).is_err());
        assert!(EncryptionEngine::new().with_compression_level(19).is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_encrypt_decrypt_roundtrip(
            plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
            password in proptest::collection::vec(any::<u8>(), 1..32),
        ) {
            let engine = EncryptionEngine::new();
            let sealed = engine.encrypt(&plaintext, &password, &config()).unwrap();
            let restored = engine.decrypt(&sealed, &password, &config()).unwrap();
            prop_assert_eq!(restored, plaintext);
        }
    }
}
