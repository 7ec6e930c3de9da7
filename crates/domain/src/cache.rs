//! Characteristic cache — last-known raw value per characteristic UUID.
//!
//! Pure key-value storage: no decoding happens here. Besides values the
//! cache remembers which characteristics the peripheral exposed during
//! discovery, so reads of absent characteristics can be refused up front.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

/// Raw characteristic values for the current connection.
#[derive(Debug, Default, Clone)]
pub struct CharacteristicCache {
    known: HashSet<Uuid>,
    values: HashMap<Uuid, Vec<u8>>,
}

impl CharacteristicCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the peripheral exposes `uuid`, without a value yet.
    pub fn register(&mut self, uuid: Uuid) {
        self.known.insert(uuid);
    }

    /// Whether `uuid` was discovered (or has a value).
    #[must_use]
    pub fn is_known(&self, uuid: Uuid) -> bool {
        self.known.contains(&uuid) || self.values.contains_key(&uuid)
    }

    /// Store the latest raw value for `uuid`, replacing any previous one.
    pub fn put(&mut self, uuid: Uuid, value: Vec<u8>) {
        self.known.insert(uuid);
        self.values.insert(uuid, value);
    }

    /// Last raw value for `uuid`, if one was read.
    #[must_use]
    pub fn get(&self, uuid: Uuid) -> Option<&[u8]> {
        self.values.get(&uuid).map(Vec::as_slice)
    }

    /// Drop every value and every discovered characteristic.
    pub fn clear(&mut self) {
        self.known.clear();
        self.values.clear();
    }

    /// Number of characteristics holding a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no characteristic holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characteristic::{BATTERY_UUID, MAJOR_UUID};

    #[test]
    fn should_return_stored_value() {
        let mut cache = CharacteristicCache::new();
        cache.put(MAJOR_UUID, vec![0x00, 0x01]);
        assert_eq!(cache.get(MAJOR_UUID), Some(&[0x00, 0x01][..]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn should_replace_previous_value() {
        let mut cache = CharacteristicCache::new();
        cache.put(MAJOR_UUID, vec![0x00, 0x01]);
        cache.put(MAJOR_UUID, vec![0x00, 0x02]);
        assert_eq!(cache.get(MAJOR_UUID), Some(&[0x00, 0x02][..]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn should_know_registered_characteristic_without_value() {
        let mut cache = CharacteristicCache::new();
        cache.register(BATTERY_UUID);
        assert!(cache.is_known(BATTERY_UUID));
        assert_eq!(cache.get(BATTERY_UUID), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn should_forget_everything_on_clear() {
        let mut cache = CharacteristicCache::new();
        cache.register(BATTERY_UUID);
        cache.put(MAJOR_UUID, vec![0x00, 0x01]);

        cache.clear();

        assert_eq!(cache.get(MAJOR_UUID), None);
        assert!(!cache.is_known(BATTERY_UUID));
        assert!(cache.is_empty());
    }

    #[test]
    fn should_be_noop_when_cleared_twice() {
        let mut cache = CharacteristicCache::new();
        cache.put(MAJOR_UUID, vec![0x00, 0x01]);
        cache.clear();
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.is_known(MAJOR_UUID));
    }
}
