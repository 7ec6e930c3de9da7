//! Firmware version reported by the software-version characteristic.

use serde::{Deserialize, Serialize};

/// Parsed `major.minor.patch` firmware version.
///
/// Ordering is lexicographic over (major, minor, patch), which is what the
/// write-policy table relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    /// Build a version from its three components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Components as `[major, minor, patch]`.
    #[must_use]
    pub fn as_array(self) -> [u32; 3] {
        [self.major, self.minor, self.patch]
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_order_by_major_then_minor_then_patch() {
        assert!(FirmwareVersion::new(1, 0, 9) < FirmwareVersion::new(1, 1, 0));
        assert!(FirmwareVersion::new(1, 9, 9) < FirmwareVersion::new(2, 0, 0));
        assert!(FirmwareVersion::new(1, 1, 1) > FirmwareVersion::new(1, 1, 0));
    }

    #[test]
    fn should_display_dotted() {
        assert_eq!(FirmwareVersion::new(1, 2, 3).to_string(), "1.2.3");
    }

    #[test]
    fn should_expose_components_as_array() {
        assert_eq!(FirmwareVersion::new(1, 2, 3).as_array(), [1, 2, 3]);
    }
}
