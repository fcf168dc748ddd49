//! Common error types for PhantomVault.

use thiserror::Error;

/// Top-level error type for PhantomVault operations.
///
/// Messages carried by these variants must never include key material,
/// passwords or decrypted file contents.
#[derive(Debug, Error)]
pub enum Error {
    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Vault operation failed.
    #[error("Vault error: {0}")]
    Vault(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Stored data or in-memory state failed an integrity check.
    #[error("Integrity failure: {0}")]
    Integrity(String),

    /// Caller lacks the authorization required for the operation.
    #[error("Access denied: {0}")]
    AccessDenied(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Whether this error means the caller has to authenticate again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Error::AccessDenied(_) | Error::Integrity(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
