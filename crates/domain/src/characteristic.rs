//! The fixed GATT characteristic schema exposed by Plutocon beacons.
//!
//! Standard Bluetooth SIG characteristics (GAP device name, Device
//! Information Service strings) use their assigned 16-bit UUIDs on the SIG
//! base. Beacon-specific settings live on the vendor base
//! `0000xxxx-4b54-4348-8000-504c55544f4e`.
//!
//! These values are protocol constants: they must match the firmware
//! bit for bit.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// GAP Device Name (`0x2A00`).
pub const DEVICE_NAME_UUID: Uuid = Uuid::from_u128(0x0000_2a00_0000_1000_8000_0080_5f9b_34fb);

/// DIS Model Number String (`0x2A24`).
pub const MODEL_NUMBER_UUID: Uuid = Uuid::from_u128(0x0000_2a24_0000_1000_8000_0080_5f9b_34fb);

/// DIS Hardware Revision String (`0x2A27`).
pub const HARDWARE_VERSION_UUID: Uuid =
    Uuid::from_u128(0x0000_2a27_0000_1000_8000_0080_5f9b_34fb);

/// DIS Software Revision String (`0x2A28`).
pub const SOFTWARE_VERSION_UUID: Uuid =
    Uuid::from_u128(0x0000_2a28_0000_1000_8000_0080_5f9b_34fb);

/// DIS Manufacturer Name String (`0x2A29`).
pub const MANUFACTURER_NAME_UUID: Uuid =
    Uuid::from_u128(0x0000_2a29_0000_1000_8000_0080_5f9b_34fb);

/// iBeacon major (u16 BE).
pub const MAJOR_UUID: Uuid = Uuid::from_u128(0x0000_0101_4b54_4348_8000_504c_5554_4f4e);

/// iBeacon minor (u16 BE).
pub const MINOR_UUID: Uuid = Uuid::from_u128(0x0000_0102_4b54_4348_8000_504c_5554_4f4e);

/// Advertising interval in milliseconds (i16 BE).
pub const ADV_INTERVAL_UUID: Uuid = Uuid::from_u128(0x0000_0103_4b54_4348_8000_504c_5554_4f4e);

/// Broadcasting (TX) power in dBm (i16 BE).
pub const TX_LEVEL_UUID: Uuid = Uuid::from_u128(0x0000_0104_4b54_4348_8000_504c_5554_4f4e);

/// Battery voltage in millivolts (i16 BE).
pub const BATTERY_UUID: Uuid = Uuid::from_u128(0x0000_0105_4b54_4348_8000_504c_5554_4f4e);

/// 128-bit beacon identifier, optionally carrying coordinates.
pub const IDENTIFIER_UUID: Uuid = Uuid::from_u128(0x0000_0106_4b54_4348_8000_504c_5554_4f4e);

/// Advertised packet format code (u16 BE).
pub const PACKET_FORMAT_UUID: Uuid = Uuid::from_u128(0x0000_0107_4b54_4348_8000_504c_5554_4f4e);

/// One property of the fixed beacon schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    DeviceName,
    Major,
    Minor,
    AdvertisingInterval,
    TxLevel,
    Battery,
    SoftwareVersion,
    HardwareVersion,
    ModelNumber,
    ManufacturerName,
    Identifier,
    PacketFormat,
}

impl Characteristic {
    /// Properties read right after service discovery, in read order.
    pub const DEFAULT_READ_SET: [Self; 12] = [
        Self::DeviceName,
        Self::Major,
        Self::Minor,
        Self::AdvertisingInterval,
        Self::TxLevel,
        Self::Battery,
        Self::SoftwareVersion,
        Self::HardwareVersion,
        Self::ModelNumber,
        Self::ManufacturerName,
        Self::Identifier,
        Self::PacketFormat,
    ];

    /// The GATT UUID of this property.
    #[must_use]
    pub fn uuid(self) -> Uuid {
        match self {
            Self::DeviceName => DEVICE_NAME_UUID,
            Self::Major => MAJOR_UUID,
            Self::Minor => MINOR_UUID,
            Self::AdvertisingInterval => ADV_INTERVAL_UUID,
            Self::TxLevel => TX_LEVEL_UUID,
            Self::Battery => BATTERY_UUID,
            Self::SoftwareVersion => SOFTWARE_VERSION_UUID,
            Self::HardwareVersion => HARDWARE_VERSION_UUID,
            Self::ModelNumber => MODEL_NUMBER_UUID,
            Self::ManufacturerName => MANUFACTURER_NAME_UUID,
            Self::Identifier => IDENTIFIER_UUID,
            Self::PacketFormat => PACKET_FORMAT_UUID,
        }
    }

    /// Reverse lookup of [`uuid`](Self::uuid).
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::DEFAULT_READ_SET
            .into_iter()
            .find(|characteristic| characteristic.uuid() == uuid)
    }

    /// Whether the firmware accepts writes to this property.
    #[must_use]
    pub fn is_writable(self) -> bool {
        !matches!(
            self,
            Self::Battery
                | Self::SoftwareVersion
                | Self::HardwareVersion
                | Self::ModelNumber
                | Self::ManufacturerName
        )
    }
}

impl std::fmt::Display for Characteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::DeviceName => "device_name",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::AdvertisingInterval => "advertising_interval",
            Self::TxLevel => "tx_level",
            Self::Battery => "battery",
            Self::SoftwareVersion => "software_version",
            Self::HardwareVersion => "hardware_version",
            Self::ModelNumber => "model_number",
            Self::ManufacturerName => "manufacturer_name",
            Self::Identifier => "identifier",
            Self::PacketFormat => "packet_format",
        };
        f.write_str(label)
    }
}
