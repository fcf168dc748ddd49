//! Sealed payloads and the `*.enc` file record.
//!
//! Every sealed payload carries its own decryption parameters (salt, IV,
//! compression, sizes and KDF cost), so opening it never depends on the
//! settings that are current at unlock time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use phantomvault_common::{Error, Result};
use phantomvault_crypto::{
    aead, constant_time_compare, sha256_hex, CompressionAlgorithm, EncryptionEngine,
    EncryptionResult, KeyDerivationConfig, Salt,
};

mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Ciphertext plus everything except the key needed to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlob {
    #[serde(with = "b64")]
    pub encrypted_data: Vec<u8>,
    #[serde(with = "b64")]
    pub iv: Vec<u8>,
    #[serde(with = "b64")]
    pub salt: Vec<u8>,
    pub algorithm: String,
    pub compression: CompressionAlgorithm,
    pub compressed_size: usize,
    pub original_size: usize,
    pub kdf: KeyDerivationConfig,
}

impl SealedBlob {
    /// Encrypt `plaintext` under `master_key`.
    pub fn seal(
        engine: &EncryptionEngine,
        plaintext: &[u8],
        master_key: &[u8],
        kdf: &KeyDerivationConfig,
    ) -> Result<Self> {
        let result = engine.encrypt(plaintext, master_key, kdf)?;
        Ok(Self::from_result(result, kdf.clone()))
    }

    fn from_result(result: EncryptionResult, kdf: KeyDerivationConfig) -> Self {
        Self {
            encrypted_data: result.encrypted_data,
            iv: result.iv,
            salt: result.salt.as_bytes().to_vec(),
            algorithm: result.algorithm,
            compression: result.compression_algorithm,
            compressed_size: result.compressed_size,
            original_size: result.original_size,
            kdf,
        }
    }

    /// Decrypt with `master_key`.
    ///
    /// # Errors
    /// - `Crypto` for an unknown algorithm label or a wrong key
    /// - `Integrity` if the recovered size does not match
    pub fn open(&self, engine: &EncryptionEngine, master_key: &[u8]) -> Result<Vec<u8>> {
        if self.algorithm != aead::ALGORITHM {
            return Err(Error::Crypto(format!(
                "Unsupported algorithm: {}",
                self.algorithm
            )));
        }
        let sealed = EncryptionResult {
            encrypted_data: self.encrypted_data.clone(),
            iv: self.iv.clone(),
            salt: Salt::from_bytes(self.salt.clone()),
            original_size: self.original_size,
            compressed_size: self.compressed_size,
            compression_algorithm: self.compression,
            algorithm: self.algorithm.clone(),
        };
        engine.decrypt(&sealed, master_key, &self.kdf)
    }
}

/// Attributes of a source file captured at lock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub original_path: PathBuf,
    /// Permission bits as an octal string, e.g. `"644"`.
    pub original_permissions: String,
    pub original_size: u64,
    pub created_timestamp: Option<DateTime<Utc>>,
    pub modified_timestamp: Option<DateTime<Utc>>,
    pub accessed_timestamp: Option<DateTime<Utc>>,
    pub checksum_sha256: String,
}

impl FileMetadata {
    /// Capture the attributes of `path`, whose content is `data`.
    pub fn capture(path: &Path, data: &[u8]) -> Result<Self> {
        let meta = fs::metadata(path)?;
        let stamp = |t: std::io::Result<SystemTime>| t.ok().map(DateTime::<Utc>::from);

        Ok(Self {
            original_path: path.to_path_buf(),
            original_permissions: permissions_to_octal(&meta.permissions()),
            original_size: meta.len(),
            created_timestamp: stamp(meta.created()),
            modified_timestamp: stamp(meta.modified()),
            accessed_timestamp: stamp(meta.accessed()),
            checksum_sha256: sha256_hex(data),
        })
    }

    /// Check restored content against the recorded checksum.
    pub fn verify_checksum(&self, data: &[u8]) -> Result<()> {
        let actual = sha256_hex(data);
        if constant_time_compare(actual.as_bytes(), self.checksum_sha256.as_bytes()) {
            Ok(())
        } else {
            Err(Error::Integrity(format!(
                "Checksum mismatch for {}",
                self.original_path.display()
            )))
        }
    }

    /// Re-apply timestamps, then permissions, to a restored file.
    ///
    /// Timestamps go first because a read-only mode would prevent opening
    /// the file to set them.
    pub fn apply(&self, path: &Path) -> Result<()> {
        let mut times = fs::FileTimes::new();
        let mut any = false;
        if let Some(modified) = self.modified_timestamp {
            times = times.set_modified(SystemTime::from(modified));
            any = true;
        }
        if let Some(accessed) = self.accessed_timestamp {
            times = times.set_accessed(SystemTime::from(accessed));
            any = true;
        }
        if any {
            let file = fs::File::options().write(true).open(path)?;
            file.set_times(times)?;
        }

        if let Some(permissions) = permissions_from_octal(&self.original_permissions) {
            fs::set_permissions(path, permissions)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn permissions_to_octal(permissions: &fs::Permissions) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:o}", permissions.mode() & 0o7777)
}

#[cfg(not(unix))]
fn permissions_to_octal(permissions: &fs::Permissions) -> String {
    let mode = if permissions.readonly() { "444" } else { "644" };
    mode.to_string()
}

#[cfg(unix)]
fn permissions_from_octal(octal: &str) -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    let mode = u32::from_str_radix(octal, 8).ok()?;
    Some(fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn permissions_from_octal(_octal: &str) -> Option<fs::Permissions> {
    None
}

/// Contents of one `*.enc` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFileRecord {
    #[serde(flatten)]
    pub blob: SealedBlob,
    pub metadata: FileMetadata,
}

impl EncryptedFileRecord {
    pub fn read(path: &Path) -> Result<Self> {
        crate::layout::read_json(path)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        crate::layout::write_json(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn kdf() -> KeyDerivationConfig {
        KeyDerivationConfig::lightweight()
    }

    #[test]
    fn test_blob_seal_open() {
        let engine = EncryptionEngine::new();
        let blob = SealedBlob::seal(&engine, b"payload", b"secret123", &kdf()).unwrap();

        assert_eq!(blob.open(&engine, b"secret123").unwrap(), b"payload");
        assert!(blob.open(&engine, b"secret124").is_err());
    }

    #[test]
    fn test_blob_json_uses_base64() {
        let engine = EncryptionEngine::new();
        let blob = SealedBlob::seal(&engine, b"payload", b"secret123", &kdf()).unwrap();

        let value = serde_json::to_value(&blob).unwrap();
        assert!(value["iv"].is_string());
        assert!(value["salt"].is_string());
        assert_eq!(value["algorithm"], "AES-256-GCM");

        let restored: SealedBlob = serde_json::from_value(value).unwrap();
        assert_eq!(restored, blob);
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let engine = EncryptionEngine::new();
        let mut blob = SealedBlob::seal(&engine, b"payload", b"secret123", &kdf()).unwrap();
        blob.algorithm = "AES-256-XTS".to_string();

        assert!(matches!(
            blob.open(&engine, b"secret123"),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn test_file_metadata_capture_and_checksum() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("note.txt");
        fs::write(&path, b"0123456789").unwrap();

        let meta = FileMetadata::capture(&path, b"0123456789").unwrap();
        assert_eq!(meta.original_size, 10);
        assert!(meta.modified_timestamp.is_some());
        meta.verify_checksum(b"0123456789").unwrap();
        assert!(matches!(
            meta.verify_checksum(b"0123456780"),
            Err(Error::Integrity(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_metadata_apply_restores_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("script.sh");
        fs::write(&path, b"#!/bin/sh").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o750)).unwrap();

        let meta = FileMetadata::capture(&path, b"#!/bin/sh").unwrap();
        assert_eq!(meta.original_permissions, "750");

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        meta.apply(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }

    #[test]
    fn test_record_json_shape() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        fs::write(&source, b"abc").unwrap();

        let engine = EncryptionEngine::new();
        let record = EncryptedFileRecord {
            blob: SealedBlob::seal(&engine, b"abc", b"secret123", &kdf()).unwrap(),
            metadata: FileMetadata::capture(&source, b"abc").unwrap(),
        };
        let path = temp.path().join("a.txt.enc");
        record.write(&path).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(value["encrypted_data"].is_string());
        assert!(value["metadata"]["checksum_sha256"].is_string());
        assert_eq!(EncryptedFileRecord::read(&path).unwrap(), record);
    }
}
