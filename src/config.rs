//! Session policy configuration.

use std::path::Path;

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Policies for the scan/connect lifecycle.
///
/// The defaults mirror how the session is meant to run unattended: the radio
/// keeps scanning while connected so new peripherals keep appearing, and each
/// new scan cycle drops stale registry entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Stop the scan as soon as a connection attempt starts. The scan is
    /// resumed when the session falls back to Scanning. When false the radio
    /// keeps discovering peripherals for the whole session.
    pub stop_scan_on_connect: bool,
    /// Clear previously discovered peripherals when a new scan cycle starts,
    /// so reconnect cycles never show stale entries.
    pub clear_registry_on_scan: bool,
    /// Maximum number of connection attempts inside the adapter gateway.
    pub connect_max_retries: u32,
    /// Delay between connection attempts in milliseconds.
    pub connect_retry_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            stop_scan_on_connect: false,
            clear_registry_on_scan: true,
            connect_max_retries: 3,
            connect_retry_delay_ms: 1000,
        }
    }
}

impl SessionConfig {
    /// Loads the config from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub async fn load_config(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Session config not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Session config loaded from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_scanning_and_clear_stale_entries() {
        let config = SessionConfig::default();
        assert!(!config.stop_scan_on_connect);
        assert!(config.clear_registry_on_scan);
        assert_eq!(config.connect_max_retries, 3);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "stop_scan_on_connect": true }"#).unwrap();
        assert!(config.stop_scan_on_connect);
        assert!(config.clear_registry_on_scan);
        assert_eq!(config.connect_retry_delay_ms, 1000);
    }
}
