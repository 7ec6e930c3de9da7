//! Firmware-dependent encodings for writable numeric properties.
//!
//! Firmware before 1.1.0 stores the TX power in a single signed byte. Later
//! firmware takes a big-endian `i16`, like the advertising interval. When the
//! firmware version is unknown the newest layout is used.

use plutocon_domain::codec;
use plutocon_domain::error::EncodeError;
use plutocon_domain::version::FirmwareVersion;

/// Width of an encoded signed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    OneByte,
    TwoBytes,
}

/// Encoding rules for one firmware range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    /// First firmware version this policy applies to.
    pub since: FirmwareVersion,
    pub broadcasting_power: Width,
    pub advertising_interval: Width,
}

const POLICIES: [WritePolicy; 2] = [
    WritePolicy {
        since: FirmwareVersion::new(0, 0, 0),
        broadcasting_power: Width::OneByte,
        advertising_interval: Width::TwoBytes,
    },
    WritePolicy {
        since: FirmwareVersion::new(1, 1, 0),
        broadcasting_power: Width::TwoBytes,
        advertising_interval: Width::TwoBytes,
    },
];

impl WritePolicy {
    /// Newest policy.
    #[must_use]
    pub fn latest() -> Self {
        POLICIES[POLICIES.len() - 1]
    }

    /// Policy for `version`, or [`latest`](Self::latest) when unknown.
    #[must_use]
    pub fn for_version(version: Option<FirmwareVersion>) -> Self {
        let Some(version) = version else {
            return Self::latest();
        };
        POLICIES
            .iter()
            .rev()
            .find(|policy| policy.since <= version)
            .copied()
            .unwrap_or_else(Self::latest)
    }

    /// Encode a TX power level in dBm.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::OutOfRange`] when the value does not fit the
    /// one-byte layout.
    pub fn encode_broadcasting_power(&self, dbm: i16) -> Result<Vec<u8>, EncodeError> {
        encode_signed("broadcasting_power", self.broadcasting_power, dbm)
    }

    /// Encode an advertising interval.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::OutOfRange`] when the value does not fit the
    /// one-byte layout.
    pub fn encode_advertising_interval(&self, interval: i16) -> Result<Vec<u8>, EncodeError> {
        encode_signed("advertising_interval", self.advertising_interval, interval)
    }
}

fn encode_signed(field: &'static str, width: Width, value: i16) -> Result<Vec<u8>, EncodeError> {
    match width {
        Width::OneByte => codec::encode_i8(field, value),
        Width::TwoBytes => Ok(codec::encode_i16(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_one_byte_power_before_1_1_0() {
        let policy = WritePolicy::for_version(Some(FirmwareVersion::new(1, 0, 9)));
        assert_eq!(policy.encode_broadcasting_power(-8).unwrap(), vec![0xF8]);
    }

    #[test]
    fn should_use_two_byte_power_from_1_1_0() {
        let policy = WritePolicy::for_version(Some(FirmwareVersion::new(1, 1, 0)));
        assert_eq!(policy.encode_broadcasting_power(-8).unwrap(), vec![0xFF, 0xF8]);
    }

    #[test]
    fn should_fall_back_to_latest_when_version_unknown() {
        assert_eq!(WritePolicy::for_version(None), WritePolicy::latest());
        assert_eq!(WritePolicy::latest().broadcasting_power, Width::TwoBytes);
    }

    #[test]
    fn should_always_encode_interval_as_i16() {
        for version in [FirmwareVersion::new(0, 9, 0), FirmwareVersion::new(2, 0, 0)] {
            let policy = WritePolicy::for_version(Some(version));
            assert_eq!(
                policy.encode_advertising_interval(1000).unwrap(),
                vec![0x03, 0xE8]
            );
        }
    }

    #[test]
    fn should_reject_power_outside_one_byte_on_legacy_firmware() {
        let policy = WritePolicy::for_version(Some(FirmwareVersion::new(1, 0, 0)));
        let err = policy.encode_broadcasting_power(200).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::OutOfRange {
                field: "broadcasting_power",
                ..
            }
        ));
    }
}
