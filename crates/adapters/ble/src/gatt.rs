//! GATT helpers on top of btleplug.

use std::time::Duration;

use btleplug::api::{
    BDAddr, Central, CentralEvent, CharPropFlags, Characteristic, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Peripheral};
use plutocon_app::ports::DiscoveredCharacteristic;
use tokio_stream::StreamExt as _;

use crate::error::BleError;

/// Parse a `XX:XX:XX:XX:XX:XX` address.
///
/// # Errors
///
/// Returns [`BleError::InvalidAddress`] for anything else.
pub fn parse_address(address: &str) -> Result<BDAddr, BleError> {
    BDAddr::from_str_delim(address).map_err(|err| {
        tracing::debug!(%err, address, "rejecting address");
        BleError::InvalidAddress(address.to_owned())
    })
}

/// Find a GATT characteristic by UUID on a peripheral that has already
/// discovered its services.
///
/// # Errors
///
/// Returns [`BleError::CharacteristicNotFound`] if no characteristic with
/// the given UUID is present.
pub fn find_characteristic(
    peripheral: &Peripheral,
    uuid: uuid::Uuid,
) -> Result<Characteristic, BleError> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or(BleError::CharacteristicNotFound { uuid })
}

/// Describe a btleplug characteristic in port terms.
pub fn to_discovered(characteristic: &Characteristic) -> DiscoveredCharacteristic {
    DiscoveredCharacteristic {
        service: characteristic.service_uuid,
        characteristic: characteristic.uuid,
        descriptors: characteristic
            .descriptors
            .iter()
            .map(|descriptor| descriptor.uuid)
            .collect(),
    }
}

/// Scan until a peripheral with `address` shows up.
///
/// Peripherals the adapter already knows are checked first.
///
/// # Errors
///
/// Returns [`BleError::PeripheralNotFound`] when the scan times out, or a
/// btleplug error when scanning cannot start.
pub async fn find_peripheral(
    adapter: &Adapter,
    address: BDAddr,
    timeout: Duration,
) -> Result<Peripheral, BleError> {
    if let Some(peripheral) = known_peripheral(adapter, address).await? {
        return Ok(peripheral);
    }

    let mut events = adapter.events().await?;
    adapter.start_scan(ScanFilter::default()).await?;
    tracing::debug!(%address, timeout_secs = timeout.as_secs(), "scanning for peripheral");

    let deadline = tokio::time::Instant::now() + timeout;
    let mut found = None;
    while found.is_none() {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, events.next()).await {
            Ok(Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id))) => {
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                if peripheral.address() == address {
                    found = Some(peripheral);
                }
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }

    if let Err(err) = adapter.stop_scan().await {
        tracing::warn!(%err, "failed to stop BLE scan");
    }
    found.ok_or_else(|| BleError::PeripheralNotFound {
        address: address.to_string(),
    })
}

async fn known_peripheral(
    adapter: &Adapter,
    address: BDAddr,
) -> Result<Option<Peripheral>, BleError> {
    Ok(adapter
        .peripherals()
        .await?
        .into_iter()
        .find(|peripheral| peripheral.address() == address))
}

/// Subscribe to every characteristic that supports notifications.
///
/// Failures are logged and skipped.
pub async fn subscribe_notifiable(peripheral: &Peripheral) {
    for characteristic in peripheral.characteristics() {
        if !characteristic.properties.contains(CharPropFlags::NOTIFY) {
            continue;
        }
        if let Err(err) = peripheral.subscribe(&characteristic).await {
            tracing::warn!(%err, uuid = %characteristic.uuid, "failed to subscribe");
        }
    }
}
