//! Value codec — pure functions between raw characteristic payloads and
//! typed beacon values.
//!
//! | Property | Encoding |
//! |----------|----------|
//! | major, minor, packet format | u16 BE |
//! | advertising interval, TX power, battery | i16 BE |
//! | name, versions, model, manufacturer | UTF-8 |
//! | identifier | 16 bytes, big-endian UUID |
//!
//! ## Coordinates in the identifier
//!
//! The beacon identifier doubles as a location tag. In its lowercase
//! hyphenated rendering the characters at fixed offsets are *decimal*
//! digits:
//!
//! ```text
//! xxxxxxxx-LLLL-llll-llGG-GGgggggg....
//!          9    14   19 21 24 26    32
//! ```
//!
//! `LLLL`/`GGGG` are integer degrees and `llllll`/`gggggg` millionths.
//! An integer part of 1000 or more flags the southern/western hemisphere.
//! The offsets are a vendor protocol constant.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DecodeError, EncodeError};
use crate::version::FirmwareVersion;

/// Longest device name the firmware stores, in bytes.
pub const MAX_NAME_LEN: usize = 20;

const COORDINATE_SCALE: u64 = 1_000_000;
const HEMISPHERE_FLAG: u64 = 1000 * COORDINATE_SCALE;
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Advertisement layout the beacon broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketFormat {
    KongTech,
    IBeacon,
}

impl PacketFormat {
    /// Wire code of the format.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::IBeacon => 0x4C,
            Self::KongTech => 0x59,
        }
    }

    /// Map a wire code back to a format. Unknown codes are `None`.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x4C => Some(Self::IBeacon),
            0x59 => Some(Self::KongTech),
            _ => None,
        }
    }
}

impl std::fmt::Display for PacketFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KongTech => f.write_str("KongTech"),
            Self::IBeacon => f.write_str("iBeacon"),
        }
    }
}

/// Character ranges of one coordinate inside the hyphenated identifier.
struct CoordinateLayout {
    integer: &'static [Range<usize>],
    fraction: &'static [Range<usize>],
}

const LATITUDE: CoordinateLayout = CoordinateLayout {
    integer: &[9..13],
    fraction: &[14..18, 19..21],
};

const LONGITUDE: CoordinateLayout = CoordinateLayout {
    integer: &[21..23, 24..26],
    fraction: &[26..32],
};

/// Decode a big-endian unsigned 16-bit value from the first two bytes.
///
/// # Errors
///
/// Returns [`DecodeError::TooShort`] when fewer than two bytes are given.
pub fn decode_u16(bytes: &[u8]) -> Result<u16, DecodeError> {
    match bytes {
        [high, low, ..] => Ok(u16::from_be_bytes([*high, *low])),
        _ => Err(DecodeError::TooShort {
            expected: 2,
            actual: bytes.len(),
        }),
    }
}

/// Decode a big-endian signed 16-bit value from the first two bytes.
///
/// # Errors
///
/// Returns [`DecodeError::TooShort`] when fewer than two bytes are given.
pub fn decode_i16(bytes: &[u8]) -> Result<i16, DecodeError> {
    decode_u16(bytes).map(|value| i16::from_be_bytes(value.to_be_bytes()))
}

/// Decode the packet format code. Unknown codes and short payloads are
/// `None`, never an error.
#[must_use]
pub fn decode_packet_format(bytes: &[u8]) -> Option<PacketFormat> {
    decode_u16(bytes).ok().and_then(PacketFormat::from_code)
}

/// Decode a UTF-8 string, replacing invalid sequences.
#[must_use]
pub fn decode_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parse a software version such as `"v1.2.3"`.
///
/// The first character is a prefix and ignored. At least three numeric
/// dot-separated components must follow; extra components are ignored.
///
/// # Errors
///
/// Returns [`DecodeError::MalformedVersion`] for anything else.
pub fn parse_software_version(raw: &str) -> Result<FirmwareVersion, DecodeError> {
    let malformed = || DecodeError::MalformedVersion(raw.to_owned());

    let mut chars = raw.chars();
    chars.next().ok_or_else(malformed)?;

    let mut parts = chars.as_str().split('.').map(str::parse::<u32>);
    let mut next = || parts.next().and_then(Result::ok).ok_or_else(malformed);

    Ok(FirmwareVersion::new(next()?, next()?, next()?))
}

/// Decode the 128-bit identifier from its first 16 bytes.
///
/// # Errors
///
/// Returns [`DecodeError::TooShort`] when fewer than 16 bytes are given.
pub fn decode_identifier(bytes: &[u8]) -> Result<Uuid, DecodeError> {
    bytes
        .get(..16)
        .and_then(|head| <[u8; 16]>::try_from(head).ok())
        .map(Uuid::from_bytes)
        .ok_or(DecodeError::TooShort {
            expected: 16,
            actual: bytes.len(),
        })
}

/// Latitude in degrees carried by `identifier`.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidCoordinate`] when the latitude digits are
/// not decimal.
pub fn decode_latitude(identifier: Uuid) -> Result<f64, DecodeError> {
    decode_coordinate(identifier, &LATITUDE)
}

/// Longitude in degrees carried by `identifier`.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidCoordinate`] when the longitude digits are
/// not decimal.
pub fn decode_longitude(identifier: Uuid) -> Result<f64, DecodeError> {
    decode_coordinate(identifier, &LONGITUDE)
}

#[allow(clippy::cast_precision_loss)]
fn decode_coordinate(identifier: Uuid, layout: &CoordinateLayout) -> Result<f64, DecodeError> {
    let text = identifier.hyphenated().to_string();
    let parse = |ranges: &[Range<usize>]| {
        read_digits(&text, ranges).ok_or(DecodeError::InvalidCoordinate(identifier))
    };

    let raw = parse(layout.integer)? * COORDINATE_SCALE + parse(layout.fraction)?;
    let signed = if raw >= HEMISPHERE_FLAG {
        -((raw - HEMISPHERE_FLAG) as f64)
    } else {
        raw as f64
    };
    Ok(signed / COORDINATE_SCALE as f64)
}

fn read_digits(text: &str, ranges: &[Range<usize>]) -> Option<u64> {
    let mut value = 0u64;
    for range in ranges {
        for byte in text.get(range.clone())?.bytes() {
            if !byte.is_ascii_digit() {
                return None;
            }
            value = value * 10 + u64::from(byte - b'0');
        }
    }
    Some(value)
}

/// Return a copy of `base` carrying the given coordinates.
///
/// Only the coordinate digits change; every other nibble of `base` is kept.
/// Values are rounded to the nearest millionth of a degree.
///
/// # Errors
///
/// Returns [`EncodeError::OutOfRange`] when the latitude is outside ±90 or
/// the longitude outside ±180 (or either is not finite).
pub fn encode_coordinates(base: Uuid, latitude: f64, longitude: f64) -> Result<Uuid, EncodeError> {
    let mut bytes = base.into_bytes();
    write_coordinate(&mut bytes, &LATITUDE, "latitude", latitude, 90.0)?;
    write_coordinate(&mut bytes, &LONGITUDE, "longitude", longitude, 180.0)?;
    Ok(Uuid::from_bytes(bytes))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn write_coordinate(
    bytes: &mut [u8; 16],
    layout: &CoordinateLayout,
    field: &'static str,
    value: f64,
    limit: f64,
) -> Result<(), EncodeError> {
    if !value.is_finite() || value.abs() > limit {
        return Err(EncodeError::OutOfRange { field, value });
    }

    // bounded by 180e6, fits comfortably
    let micro = (value.abs() * 1e6).round() as u64;
    let mut integer = micro / COORDINATE_SCALE;
    if value < 0.0 && micro > 0 {
        integer += 1000;
    }
    let digits = format!("{integer:04}{:06}", micro % COORDINATE_SCALE);

    let positions = layout
        .integer
        .iter()
        .chain(layout.fraction)
        .flat_map(Clone::clone);
    for (position, digit) in positions.zip(digits.bytes()) {
        set_nibble(bytes, position, digit - b'0');
    }
    Ok(())
}

/// Overwrite the nibble rendered at `position` of the hyphenated string.
fn set_nibble(bytes: &mut [u8; 16], position: usize, value: u8) {
    let hyphens = HYPHEN_POSITIONS.iter().filter(|&&h| h < position).count();
    let nibble = position - hyphens;
    let byte = &mut bytes[nibble / 2];
    if nibble % 2 == 0 {
        *byte = (*byte & 0x0F) | (value << 4);
    } else {
        *byte = (*byte & 0xF0) | value;
    }
}

/// Encode a big-endian unsigned 16-bit value.
#[must_use]
pub fn encode_u16(value: u16) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Encode a big-endian signed 16-bit value.
#[must_use]
pub fn encode_i16(value: i16) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Encode a signed value as one byte, as legacy firmware expects.
///
/// # Errors
///
/// Returns [`EncodeError::OutOfRange`] when `value` does not fit in an `i8`.
pub fn encode_i8(field: &'static str, value: i16) -> Result<Vec<u8>, EncodeError> {
    i8::try_from(value)
        .map(|byte| byte.to_be_bytes().to_vec())
        .map_err(|_| EncodeError::OutOfRange {
            field,
            value: f64::from(value),
        })
}

/// Encode a device name.
///
/// # Errors
///
/// Returns [`EncodeError::InvalidName`] when the name is empty or longer than
/// [`MAX_NAME_LEN`] bytes.
pub fn encode_string(name: &str) -> Result<Vec<u8>, EncodeError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(EncodeError::InvalidName {
            max: MAX_NAME_LEN,
            actual: name.len(),
        });
    }
    Ok(name.as_bytes().to_vec())
}

/// Encode a packet format as its u16 BE wire code.
#[must_use]
pub fn encode_packet_format(format: PacketFormat) -> Vec<u8> {
    encode_u16(format.code())
}

/// Encode an identifier as 16 big-endian bytes.
#[must_use]
pub fn encode_identifier(identifier: Uuid) -> Vec<u8> {
    identifier.as_bytes().to_vec()
}
