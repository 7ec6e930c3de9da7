//! Device identity and decoded property snapshots.

use serde::{Deserialize, Serialize};

use crate::codec::PacketFormat;
use crate::version::FirmwareVersion;

/// Who the session talks to.
///
/// The address is fixed at session construction. The metadata fields are
/// filled from the initial read once the session becomes ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Transport-level address (MAC on most platforms).
    pub address: String,
    pub name: Option<String>,
    pub major: Option<u16>,
    pub minor: Option<u16>,
}

impl DeviceIdentity {
    /// Identity with only an address known.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            major: None,
            minor: None,
        }
    }
}

/// Every decoded beacon property at one point in time.
///
/// Fields are `None` when the characteristic was not read or did not decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconSnapshot {
    pub address: String,
    pub name: Option<String>,
    pub major: Option<u16>,
    pub minor: Option<u16>,
    pub advertising_interval: Option<i16>,
    pub broadcasting_power: Option<i16>,
    pub battery_voltage: Option<i16>,
    pub software_version: Option<FirmwareVersion>,
    pub hardware_version: Option<String>,
    pub model_number: Option<String>,
    pub manufacturer_name: Option<String>,
    pub identifier: Option<uuid::Uuid>,
    pub packet_format: Option<PacketFormat>,
    pub latitude: f64,
    pub longitude: f64,
}
