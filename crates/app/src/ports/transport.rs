//! Transport port — the BLE stack as seen by the session.
//!
//! A BLE central allows one outstanding GATT operation per connection, and
//! every operation completes asynchronously. The port therefore splits each
//! operation in two:
//!
//! 1. a **request** method on [`Transport`] that only *starts* the work and
//!    returns `Err` when the stack refuses it outright, and
//! 2. a later [`LinkEvent`] carrying the result, which the owner feeds into
//!    [`Session::handle_event`](crate::session::Session::handle_event).
//!
//! Implementations must tag every event with the [`LinkHandle`] returned by
//! the [`open`](Transport::open) call it belongs to, and must never reuse a
//! handle. The session relies on that to drop callbacks from a superseded
//! connection.

use plutocon_domain::error::TransportError;
use uuid::Uuid;

/// Opaque identifier of one opened link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkHandle(u64);

impl LinkHandle {
    /// Wrap a raw handle value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Access the raw handle value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// One `(service, characteristic, descriptors)` tuple found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
    pub service: Uuid,
    pub characteristic: Uuid,
    pub descriptors: Vec<Uuid>,
}

/// Asynchronous completion reported by the transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// The link is established.
    LinkUp,
    /// The link went down (requested or not).
    LinkDown,
    /// The link failed abnormally.
    LinkError(TransportError),
    /// Service discovery finished.
    ServicesDiscovered(Result<Vec<DiscoveredCharacteristic>, TransportError>),
    /// A characteristic read finished.
    CharacteristicRead {
        characteristic: Uuid,
        result: Result<Vec<u8>, TransportError>,
    },
    /// A characteristic write finished.
    CharacteristicWritten {
        characteristic: Uuid,
        result: Result<(), TransportError>,
    },
    /// The peripheral pushed a new value.
    CharacteristicChanged { characteristic: Uuid, value: Vec<u8> },
    /// Remote signal strength in dBm.
    SignalStrength(Result<i16, TransportError>),
}

/// A [`TransportEvent`] tagged with the link it belongs to.
#[derive(Debug)]
pub struct LinkEvent {
    pub link: LinkHandle,
    pub event: TransportEvent,
}

impl LinkEvent {
    /// Tag `event` with `link`.
    #[must_use]
    pub fn new(link: LinkHandle, event: TransportEvent) -> Self {
        Self { link, event }
    }
}

/// The BLE stack driving one peripheral.
///
/// Request methods return immediately. Errors returned here mean the request
/// was never started; results of started requests arrive as [`LinkEvent`]s.
pub trait Transport {
    /// Start opening a link to `address`. Completes with
    /// [`TransportEvent::LinkUp`] or [`TransportEvent::LinkError`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the attempt cannot be started.
    fn open(&mut self, address: &str) -> Result<LinkHandle, TransportError>;

    /// Start enumerating services and characteristics. Completes with
    /// [`TransportEvent::ServicesDiscovered`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request cannot be started.
    fn discover_services(&mut self, link: LinkHandle) -> Result<(), TransportError>;

    /// Start reading a characteristic. Completes with
    /// [`TransportEvent::CharacteristicRead`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request cannot be started.
    fn read_characteristic(
        &mut self,
        link: LinkHandle,
        characteristic: Uuid,
    ) -> Result<(), TransportError>;

    /// Start writing a characteristic (with response). Completes with
    /// [`TransportEvent::CharacteristicWritten`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request cannot be started.
    fn write_characteristic(
        &mut self,
        link: LinkHandle,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Start reading the remote signal strength. Completes with
    /// [`TransportEvent::SignalStrength`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request cannot be started.
    fn read_signal_strength(&mut self, link: LinkHandle) -> Result<(), TransportError>;

    /// Start tearing the link down. Completes with [`TransportEvent::LinkDown`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request cannot be started.
    fn disconnect(&mut self, link: LinkHandle) -> Result<(), TransportError>;

    /// Release every resource held for `link`. No event follows.
    fn close(&mut self, link: LinkHandle);
}
