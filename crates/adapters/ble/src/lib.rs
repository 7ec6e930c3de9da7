//! # plutocon-adapter-ble
//!
//! BLE adapter — implements the `Transport` port with btleplug.
//!
//! ## How it works
//!
//! [`BtleplugTransport`] owns one host adapter. Opening a link scans for
//! the beacon's address, connects and then watches the link for
//! disconnects and notifications. Every GATT request runs as its own tokio
//! task and reports back as a `LinkEvent` on the receiver returned by
//! [`BtleplugTransport::new`].
//!
//! | Request | Completion |
//! |---------|------------|
//! | `open` | `LinkUp` or `LinkError` |
//! | `discover_services` | `ServicesDiscovered` |
//! | `read_characteristic` | `CharacteristicRead` |
//! | `write_characteristic` | `CharacteristicWritten` (with response) |
//! | `read_signal_strength` | `SignalStrength` |
//! | `disconnect` | `LinkDown` or `LinkError` |
//!
//! ## Dependency rule
//!
//! Depends on `plutocon-app` and `plutocon-domain` only.

mod config;
mod error;
pub mod gatt;
mod transport;

pub use config::BleConfig;
pub use error::BleError;
pub use transport::BtleplugTransport;
