//! Zstandard compression applied before encryption.

use serde::{Deserialize, Serialize};
use std::fmt;

use phantomvault_common::{Error, Result};

/// Default zstd level.
pub const DEFAULT_LEVEL: i32 = 3;

/// Compression applied to a payload before it was encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Zstandard frame.
    Zstd,
    /// Stored as-is.
    None,
}

impl CompressionAlgorithm {
    /// Label used in persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zstd => "zstd",
            Self::None => "none",
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compress `data` into a single zstd frame.
///
/// # Errors
/// - `InvalidInput` for an empty buffer or a level outside 1..=22
/// - `Crypto` if the compressor fails
pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Err(Error::InvalidInput("Cannot compress empty data".to_string()));
    }
    if !(1..=22).contains(&level) {
        return Err(Error::InvalidInput(
            "Invalid compression level (must be 1-22)".to_string(),
        ));
    }
    zstd::bulk::compress(data, level).map_err(|e| Error::Crypto(format!("Compression failed: {}", e)))
}

/// Decompress a zstd frame that must expand to exactly `original_size` bytes.
///
/// # Errors
/// - `Integrity` if the output length differs from `original_size`
/// - `Crypto` if the frame is malformed
pub fn decompress(data: &[u8], original_size: usize) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Err(Error::InvalidInput("Cannot decompress empty data".to_string()));
    }
    let output = zstd::bulk::decompress(data, original_size)
        .map_err(|e| Error::Crypto(format!("Decompression failed: {}", e)))?;
    if output.len() != original_size {
        return Err(Error::Integrity(format!(
            "Decompressed size mismatch: expected {}, got {}",
            original_size,
            output.len()
        )));
    }
    Ok(output)
}
