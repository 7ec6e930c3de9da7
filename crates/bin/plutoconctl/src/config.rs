//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `plutoconctl.toml` in the working directory. Everything except
//! the device address has a default, and the address may come from
//! `PLUTOCON_ADDRESS` instead. Environment variables take precedence over
//! file values.

use plutocon_adapter_ble::{BleConfig, gatt};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which beacon to talk to.
    pub device: DeviceConfig,
    /// BLE adapter settings.
    pub ble: BleConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Properties to write once connected.
    pub edit: EditConfig,
}

/// Target beacon.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// MAC address, `XX:XX:XX:XX:XX:XX`.
    pub address: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax). `off` silences everything.
    pub filter: String,
}

/// Writes applied after the initial read. Unset fields are left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    pub name: Option<String>,
    pub major: Option<u16>,
    pub minor: Option<u16>,
    /// Milliseconds.
    pub advertising_interval: Option<i16>,
    /// dBm.
    pub broadcasting_power: Option<i16>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl EditConfig {
    /// Whether nothing is to be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.major.is_none()
            && self.minor.is_none()
            && self.advertising_interval.is_none()
            && self.broadcasting_power.is_none()
            && self.coordinates().is_none()
    }

    /// Latitude and longitude, when both are set.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

impl Config {
    /// Load configuration from `plutoconctl.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("plutoconctl.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PLUTOCON_ADDRESS") {
            self.device.address = val;
        }
        if let Ok(val) = std::env::var("PLUTOCON_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.device.address.is_empty() {
            return Err(ConfigError::Validation(
                "device.address (or PLUTOCON_ADDRESS) is required".to_string(),
            ));
        }
        if gatt::parse_address(&self.device.address).is_err() {
            return Err(ConfigError::Validation(format!(
                "device.address {:?} is not a XX:XX:XX:XX:XX:XX address",
                self.device.address
            )));
        }
        if self.edit.latitude.is_some() != self.edit.longitude.is_some() {
            return Err(ConfigError::Validation(
                "edit.latitude and edit.longitude must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "plutoconctl=info,plutocon=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_address() -> Config {
        let mut config = Config::default();
        config.device.address = "D0:39:72:A4:0B:7C".to_string();
        config
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert!(config.device.address.is_empty());
        assert_eq!(config.ble, BleConfig::default());
        assert_eq!(config.logging.filter, "plutoconctl=info,plutocon=info");
        assert!(config.edit.is_empty());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.ble.scan_timeout_secs, 10);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [device]
            address = 'D0:39:72:A4:0B:7C'

            [ble]
            adapter_index = 1
            scan_timeout_secs = 30
            connect_timeout_secs = 5

            [logging]
            filter = 'off'

            [edit]
            name = 'LOBBY'
            major = 7
            minor = 12
            advertising_interval = 900
            broadcasting_power = -4
            latitude = 37.566543
            longitude = 127.012345
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.device.address, "D0:39:72:A4:0B:7C");
        assert_eq!(config.ble.adapter_index, 1);
        assert_eq!(config.ble.scan_timeout_secs, 30);
        assert_eq!(config.ble.connect_timeout_secs, 5);
        assert_eq!(config.logging.filter, "off");
        assert_eq!(config.edit.name.as_deref(), Some("LOBBY"));
        assert_eq!(config.edit.major, Some(7));
        assert_eq!(config.edit.minor, Some(12));
        assert_eq!(config.edit.advertising_interval, Some(900));
        assert_eq!(config.edit.broadcasting_power, Some(-4));
        assert_eq!(config.edit.coordinates(), Some((37.566_543, 127.012_345)));
        assert!(!config.edit.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [ble]
            scan_timeout_secs = 3
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ble.scan_timeout_secs, 3);
        assert_eq!(config.ble.connect_timeout_secs, 10);
        assert_eq!(config.logging.filter, "plutoconctl=info,plutocon=info");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert!(config.device.address.is_empty());
    }

    #[test]
    fn should_require_address() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn should_reject_malformed_address() {
        let mut config = with_address();
        config.device.address = "D0:39:72".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_valid_address() {
        assert!(with_address().validate().is_ok());
    }

    #[test]
    fn should_require_latitude_and_longitude_together() {
        let mut config = with_address();
        config.edit.latitude = Some(10.0);
        assert!(config.validate().is_err());
        assert!(config.edit.is_empty());

        config.edit.longitude = Some(20.0);
        assert!(config.validate().is_ok());
        assert_eq!(config.edit.coordinates(), Some((10.0, 20.0)));
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
