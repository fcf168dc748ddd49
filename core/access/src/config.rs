//! Access-control configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use phantomvault_common::{Error, Result};

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Session and monitoring parameters. Durations are whole seconds in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Lifetime of an authenticated session.
    #[serde(with = "secs")]
    pub session_timeout: Duration,
    /// Period of the background monitor.
    #[serde(with = "secs")]
    pub monitor_interval: Duration,
    /// Gate operations on both privilege and profile authentication.
    pub require_dual_layer: bool,
    /// In single-layer mode, require admin privilege for vault access.
    pub require_elevation_for_vault: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(15 * 60),
            monitor_interval: Duration::from_secs(30),
            require_dual_layer: true,
            require_elevation_for_vault: true,
        }
    }
}

impl AccessConfig {
    /// # Errors
    /// - `InvalidInput` for a zero monitor interval
    pub fn validate(&self) -> Result<()> {
        if self.monitor_interval.is_zero() {
            return Err(Error::InvalidInput(
                "Monitor interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AccessConfig::default();
        assert_eq!(config.session_timeout, Duration::from_secs(900));
        assert_eq!(config.monitor_interval, Duration::from_secs(30));
        assert!(config.require_dual_layer);
        assert!(config.require_elevation_for_vault);
        config.validate().unwrap();
    }

    #[test]
    fn test_json_seconds() {
        let config: AccessConfig =
            serde_json::from_str(r#"{"session_timeout": 60, "require_dual_layer": false}"#)
                .unwrap();
        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert_eq!(config.monitor_interval, Duration::from_secs(30));
        assert!(!config.require_dual_layer);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["monitor_interval"], 30);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = AccessConfig {
            monitor_interval: Duration::ZERO,
            ..AccessConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
