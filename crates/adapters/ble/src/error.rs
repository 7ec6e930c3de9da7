//! BLE adapter error types.

use plutocon_domain::error::TransportError;
use uuid::Uuid;

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// A btleplug operation failed.
    #[error("BLE stack error")]
    Btle(#[from] btleplug::Error),

    /// The target address was not seen before the scan timed out.
    #[error("peripheral {address} not found")]
    PeripheralNotFound { address: String },

    /// The peripheral does not expose the characteristic.
    #[error("characteristic {uuid} not found")]
    CharacteristicNotFound { uuid: Uuid },

    /// The address is not a `XX:XX:XX:XX:XX:XX` MAC.
    #[error("invalid BLE address {0:?}")]
    InvalidAddress(String),

    /// A radio operation did not finish in time.
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    /// The peripheral did not report a signal strength.
    #[error("no signal strength reported")]
    NoSignalStrength,
}

impl BleError {
    /// Wrap as a link failure.
    #[must_use]
    pub fn into_link(self) -> TransportError {
        TransportError::Link(Box::new(self))
    }

    /// Wrap as a discovery failure.
    #[must_use]
    pub fn into_discovery(self) -> TransportError {
        TransportError::Discovery(Box::new(self))
    }

    /// Wrap as a failed read of `characteristic`.
    #[must_use]
    pub fn into_read(self, characteristic: Uuid) -> TransportError {
        TransportError::Read {
            characteristic,
            source: Box::new(self),
        }
    }

    /// Wrap as a failed write of `characteristic`.
    #[must_use]
    pub fn into_write(self, characteristic: Uuid) -> TransportError {
        TransportError::Write {
            characteristic,
            source: Box::new(self),
        }
    }

    /// Wrap as a failed signal strength read.
    #[must_use]
    pub fn into_signal_strength(self) -> TransportError {
        TransportError::SignalStrength(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn should_display_not_available_error() {
        let err = BleError::NotAvailable;
        assert_eq!(err.to_string(), "no BLE adapter available");
    }

    #[test]
    fn should_display_btle_error() {
        let err = BleError::Btle(btleplug::Error::DeviceNotFound);
        assert_eq!(err.to_string(), "BLE stack error");
        assert!(err.source().is_some());
    }

    #[test]
    fn should_display_invalid_address() {
        let err = BleError::InvalidAddress("nope".to_owned());
        assert_eq!(err.to_string(), "invalid BLE address \"nope\"");
    }

    #[test]
    fn should_keep_ble_error_as_source_of_read_failure() {
        let uuid = Uuid::from_u128(0x0105);
        let err = BleError::CharacteristicNotFound { uuid }.into_read(uuid);
        assert!(matches!(err, TransportError::Read { characteristic, .. } if characteristic == uuid));
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), format!("characteristic {uuid} not found"));
    }

    #[test]
    fn should_map_timeouts_to_link_failure() {
        let err = BleError::Timeout {
            operation: "connect",
        }
        .into_link();
        assert!(matches!(err, TransportError::Link(_)));
        assert_eq!(err.source().unwrap().to_string(), "connect timed out");
    }
}
