//! Fluent builder for a batch of writes.
//!
//! Encoding happens in the setters. The first encoding error is kept and
//! returned by [`Editor::commit`]; later setters still run but nothing is
//! dispatched.
//!
//! The identifier is written once, after every other property, combining
//! [`Editor::identifier`] and [`Editor::coordinates`] in call order.

use plutocon_domain::characteristic::Characteristic;
use plutocon_domain::codec::{self, PacketFormat};
use plutocon_domain::error::{EncodeError, PlutoconError};
use uuid::Uuid;

use super::Session;
use crate::operation::{OperationOutcome, OperationQueue, PendingOperation, QueueProgress};
use crate::ports::{SessionObserver, Transport};
use crate::write_policy::WritePolicy;

#[must_use = "an editor does nothing until committed"]
pub struct Editor<'s, T, O> {
    session: &'s mut Session<T, O>,
    queue: OperationQueue,
    policy: WritePolicy,
    identifier: Option<Uuid>,
    identifier_changed: bool,
    error: Option<EncodeError>,
}

impl<T, O> std::fmt::Debug for Editor<'_, T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("queue", &self.queue)
            .field("policy", &self.policy)
            .field("identifier", &self.identifier)
            .field("identifier_changed", &self.identifier_changed)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<'s, T: Transport, O: SessionObserver> Editor<'s, T, O> {
    pub(super) fn new(session: &'s mut Session<T, O>) -> Self {
        let version = session.software_version_detail().ok();
        let identifier = session.identifier().ok();
        Self {
            session,
            queue: OperationQueue::new(),
            policy: WritePolicy::for_version(version),
            identifier,
            identifier_changed: false,
            error: None,
        }
    }

    /// Write the device name (1 to 20 bytes of UTF-8).
    pub fn device_name(self, name: &str) -> Self {
        let encoded = codec::encode_string(name);
        self.write(Characteristic::DeviceName, encoded)
    }

    pub fn major(self, major: u16) -> Self {
        self.write(Characteristic::Major, Ok(codec::encode_u16(major)))
    }

    pub fn minor(self, minor: u16) -> Self {
        self.write(Characteristic::Minor, Ok(codec::encode_u16(minor)))
    }

    /// Write the advertising interval in milliseconds.
    pub fn advertising_interval(self, interval: i16) -> Self {
        let encoded = self.policy.encode_advertising_interval(interval);
        self.write(Characteristic::AdvertisingInterval, encoded)
    }

    /// Write the TX power in dBm, sized for the connected firmware.
    pub fn broadcasting_power(self, dbm: i16) -> Self {
        let encoded = self.policy.encode_broadcasting_power(dbm);
        self.write(Characteristic::TxLevel, encoded)
    }

    pub fn packet_format(self, format: PacketFormat) -> Self {
        self.write(
            Characteristic::PacketFormat,
            Ok(codec::encode_packet_format(format)),
        )
    }

    /// Replace the whole identifier.
    pub fn identifier(mut self, identifier: Uuid) -> Self {
        self.identifier = Some(identifier);
        self.identifier_changed = true;
        self
    }

    /// Store coordinates in the identifier, keeping its other digits.
    ///
    /// Fails with [`EncodeError::MissingIdentifier`] when no identifier was
    /// read or set.
    pub fn coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        let encoded = self
            .identifier
            .ok_or(EncodeError::MissingIdentifier)
            .and_then(|base| codec::encode_coordinates(base, latitude, longitude));
        match encoded {
            Ok(identifier) => {
                self.identifier = Some(identifier);
                self.identifier_changed = true;
            }
            Err(err) => self.keep_first(err),
        }
        self
    }

    /// Callback fired once per finished write.
    pub fn on_operation_complete<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&OperationOutcome) + Send + 'static,
    {
        self.queue.set_on_operation_complete(callback);
        self
    }

    /// Dispatch the batch.
    ///
    /// Writes do not update the session cache; read the properties again
    /// to observe the new values.
    ///
    /// # Errors
    ///
    /// Returns the first [`EncodeError`] raised by a setter, or the
    /// protocol state error that prevented dispatching.
    pub fn commit(mut self) -> Result<QueueProgress, PlutoconError> {
        if self.identifier_changed
            && let Some(identifier) = self.identifier
        {
            self = self.write(
                Characteristic::Identifier,
                Ok(codec::encode_identifier(identifier)),
            );
        }
        if let Some(err) = self.error {
            return Err(err.into());
        }
        self.session.start_requested_batch(self.queue)
    }

    fn write(
        mut self,
        characteristic: Characteristic,
        payload: Result<Vec<u8>, EncodeError>,
    ) -> Self {
        match payload {
            Ok(_) if !characteristic.is_writable() => {
                self.keep_first(EncodeError::ReadOnly(characteristic));
            }
            Ok(payload) => {
                self.queue
                    .enqueue(PendingOperation::write(characteristic.uuid(), payload));
            }
            Err(err) => self.keep_first(err),
        }
        self
    }

    fn keep_first(&mut self, err: EncodeError) {
        tracing::debug!(%err, "rejecting edit");
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}
