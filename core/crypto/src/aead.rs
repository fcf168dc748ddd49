//! Authenticated encryption using AES-256-GCM.
//!
//! The nonce (stored on disk as `iv`) is 96 bits and is generated randomly
//! for every encryption; the 128-bit authentication tag is appended to the
//! ciphertext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use crate::keys::{generate_random_bytes, KEY_LENGTH};
use phantomvault_common::{Error, Result};

/// Algorithm label persisted alongside ciphertext.
pub const ALGORITHM: &str = "AES-256-GCM";

/// Nonce size for AES-256-GCM (12 bytes).
pub const IV_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Generate a fresh random nonce.
pub fn generate_iv() -> Result<Vec<u8>> {
    generate_random_bytes(IV_SIZE)
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| Error::Crypto("Cipher initialization failed".to_string()))
}

fn check_iv(iv: &[u8]) -> Result<()> {
    if iv.len() != IV_SIZE {
        return Err(Error::Crypto(format!(
            "Invalid IV length: expected {}, got {}",
            IV_SIZE,
            iv.len()
        )));
    }
    Ok(())
}

/// Encrypt plaintext with the given key and nonce.
///
/// # Preconditions
/// - `key` must be exactly KEY_LENGTH bytes
/// - `iv` must be exactly IV_SIZE bytes and never reused with the same key
///
/// # Postconditions
/// - Returns ciphertext || tag, of length plaintext length + TAG_SIZE
///
/// # Errors
/// - Returns error if key or nonce length is incorrect
/// - Returns error if encryption fails
pub fn encrypt_with_iv(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;
    check_iv(iv)?;

    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|_| Error::Crypto("Encryption failed".to_string()))
}

/// Decrypt ciphertext produced by [`encrypt_with_iv`].
///
/// # Errors
/// - Returns error if key or nonce length is incorrect
/// - Returns error if the ciphertext is shorter than a tag
/// - Returns error if authentication fails (wrong key or tampered data)
///
/// # Security
/// - Authenticates before returning any plaintext
pub fn decrypt_with_iv(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;
    check_iv(iv)?;

    if ciphertext.len() < TAG_SIZE {
        return Err(Error::Crypto("Ciphertext too short".to_string()));
    }

    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| Error::Crypto("Decryption failed: authentication tag mismatch".to_string()))
}
