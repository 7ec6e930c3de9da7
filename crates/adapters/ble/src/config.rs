//! BLE adapter configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the btleplug transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Which host adapter to use, in the order the OS lists them.
    pub adapter_index: usize,
    /// How long to scan for the target address before giving up, in seconds.
    pub scan_timeout_secs: u16,
    /// How long a GATT connection attempt may take, in seconds.
    pub connect_timeout_secs: u16,
}

impl BleConfig {
    #[must_use]
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.scan_timeout_secs))
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_secs))
    }
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            scan_timeout_secs: 10,
            connect_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_defaults_for_empty_table() {
        let config: BleConfig = toml::from_str("").unwrap();
        assert_eq!(config, BleConfig::default());
        assert_eq!(config.scan_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn should_override_individual_fields() {
        let config: BleConfig = toml::from_str(
            r"
            adapter_index = 1
            connect_timeout_secs = 4
            ",
        )
        .unwrap();
        assert_eq!(config.adapter_index, 1);
        assert_eq!(config.scan_timeout_secs, 10);
        assert_eq!(config.connect_timeout(), Duration::from_secs(4));
    }
}
