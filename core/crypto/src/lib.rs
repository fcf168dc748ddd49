//! Cryptographic primitives for PhantomVault.
//!
//! This module provides:
//! - Key derivation using Argon2id
//! - Authenticated encryption using AES-256-GCM
//! - Zstandard compression ahead of encryption
//! - Multi-pass secure wiping and constant-time comparison
//!
//! # Security Guarantees
//! - All key material is wiped after use and zeroized on drop
//! - No plaintext or key material is ever logged
//! - Random bytes come only from the operating system CSPRNG

pub mod aead;
pub mod compress;
pub mod digest;
pub mod engine;
pub mod kdf;
pub mod keys;
pub mod memory;

pub use compress::CompressionAlgorithm;
pub use digest::{blake2b_256, sha256_hex};
pub use engine::{EncryptionEngine, EncryptionResult, EngineStatsSnapshot};
pub use kdf::{derive_key, KeyDerivationConfig};
pub use keys::{generate_random_bytes, DerivedKey, Salt, KEY_LENGTH};
pub use memory::{constant_time_compare, secure_wipe, wipe_vec};
