//! Common types used throughout PhantomVault.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Identifier of a user profile, and of the vault directory that belongs to it.
///
/// The id is used verbatim as a directory name under the vault root, so it
/// may not contain path separators or be a relative path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileId(String);

impl ProfileId {
    /// Create a new ProfileId from a string.
    ///
    /// # Preconditions
    /// - `id` must be non-empty
    /// - `id` must not contain `/`, `\` or NUL, and must not be `.` or `..`
    ///
    /// # Errors
    /// - Returns `InvalidInput` if any precondition is violated
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Profile id cannot be empty".to_string(),
            ));
        }
        if id == "." || id == ".." {
            return Err(crate::Error::InvalidInput(
                "Profile id cannot be a relative path component".to_string(),
            ));
        }
        if id.contains('/') || id.contains('\\') || id.contains('\0') {
            return Err(crate::Error::InvalidInput(
                "Profile id cannot contain separators".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ProfileId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<ProfileId> for String {
    fn from(id: ProfileId) -> Self {
        id.0
    }
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SensitiveBytes {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_id_creation() {
        let id = ProfileId::new("alice").unwrap();
        assert_eq!(id.as_str(), "alice");
        assert_eq!(id.to_string(), "alice");
    }

    #[test]
    fn test_profile_id_rejects_bad_input() {
        assert!(ProfileId::new("").is_err());
        assert!(ProfileId::new("..").is_err());
        assert!(ProfileId::new("a/b").is_err());
        assert!(ProfileId::new("a\\b").is_err());
    }

    #[test]
    fn test_profile_id_serde_validates() {
        let id: ProfileId = serde_json::from_str("\"p1\"").unwrap();
        assert_eq!(id.as_str(), "p1");
        assert!(serde_json::from_str::<ProfileId>("\"../etc\"").is_err());
    }

    #[test]
    fn test_sensitive_bytes_debug_is_redacted() {
        let secret = SensitiveBytes::from("secret123".to_string());
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("secret123"));
        assert_eq!(secret.len(), 9);
    }
}
