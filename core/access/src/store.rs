//! Profile authentication, the second layer of dual-layer access.

use async_trait::async_trait;
use tracing::warn;

use phantomvault_common::{Error, ProfileId, Result};
use phantomvault_vault::VaultManager;

/// Checks a profile's secret.
#[async_trait]
pub trait ProfileAuthenticator: Send + Sync {
    /// Authenticate `profile_id` with `secret`.
    ///
    /// # Errors
    /// - `AccessDenied` for an unknown profile or a wrong secret. The two
    ///   cases are not distinguished.
    async fn authenticate(&self, profile_id: &ProfileId, secret: &[u8]) -> Result<()>;
}

/// Profiles are authenticated against their vault's key verifier.
#[async_trait]
impl ProfileAuthenticator for VaultManager {
    async fn authenticate(&self, profile_id: &ProfileId, secret: &[u8]) -> Result<()> {
        if secret.is_empty() {
            return Err(Error::AccessDenied("Profile authentication failed".to_string()));
        }
        match self.verify_master_key(profile_id, secret).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(Error::NotFound(_)) => {
                warn!(profile = %profile_id, "Profile authentication failed");
                Err(Error::AccessDenied("Profile authentication failed".to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
