//! Beacon session — one peripheral, one link at a time.
//!
//! A [`Session`] ties together the connection state machine, the
//! characteristic cache and the operation queue. The owner starts it with
//! [`connect`](Session::connect) and then feeds every transport completion
//! into [`handle_event`](Session::handle_event). The session does the rest:
//!
//! 1. link up: service discovery is requested,
//! 2. discovery done: the discovered part of the default read set is queued,
//! 3. last read done: the session is `Ready` and the observer learns the
//!    device identity.
//!
//! Once ready, [`reader`](Session::reader) and [`editor`](Session::editor)
//! build further batches. Getters decode straight from the cache.

mod editor;
mod reader;

use plutocon_domain::cache::CharacteristicCache;
use plutocon_domain::characteristic::Characteristic;
use plutocon_domain::codec::{self, PacketFormat};
use plutocon_domain::device::{BeaconSnapshot, DeviceIdentity};
use plutocon_domain::error::{DecodeError, PlutoconError, ProtocolStateError, TransportError};
use plutocon_domain::state::ConnectionState;
use plutocon_domain::version::FirmwareVersion;
use uuid::Uuid;

use crate::connection::{ConnectionStateMachine, Termination, Transition};
use crate::operation::{
    OperationOutcome, OperationQueue, OperationResult, PendingOperation, QueueProgress,
};
use crate::ports::{
    DisconnectReason, DiscoveredCharacteristic, LinkEvent, LinkHandle, SessionEvent,
    SessionObserver, Transport, TransportEvent,
};

pub use editor::Editor;
pub use reader::Reader;

/// Why a batch is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchPurpose {
    /// Default read right after discovery; its completion makes the session
    /// ready.
    InitialRead,
    /// Built by a [`Reader`] or an [`Editor`].
    Requested,
}

#[derive(Debug)]
struct ActiveBatch {
    queue: OperationQueue,
    purpose: BatchPurpose,
}

/// Session with one Plutocon beacon.
pub struct Session<T, O> {
    identity: DeviceIdentity,
    transport: T,
    observer: O,
    machine: ConnectionStateMachine,
    cache: CharacteristicCache,
    batch: Option<ActiveBatch>,
}

impl<T: Transport, O: SessionObserver> Session<T, O> {
    /// Create an idle session for the peripheral at `address`.
    pub fn new(address: impl Into<String>, transport: T, observer: O) -> Self {
        Self {
            identity: DeviceIdentity::new(address),
            transport,
            observer,
            machine: ConnectionStateMachine::new(),
            cache: CharacteristicCache::new(),
            batch: None,
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.identity.address
    }

    /// Address plus the metadata learned by the initial read.
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Whether the session is `Ready`.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Number of connection attempts started so far.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.machine.epoch()
    }

    /// Handle of the current link, if any.
    #[must_use]
    pub fn link(&self) -> Option<LinkHandle> {
        self.machine.link()
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Start connecting. Allowed from `Idle`, `Disconnected` and `Failed`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolStateError::AlreadyConnecting`] or
    /// [`ProtocolStateError::AlreadyConnected`] when an attempt is underway,
    /// or the [`TransportError`] that prevented opening the link. In the
    /// latter case the session is `Failed` and the observer was notified.
    #[tracing::instrument(skip(self), fields(address = %self.identity.address))]
    pub fn connect(&mut self) -> Result<(), PlutoconError> {
        let transition = self.machine.begin_connect()?;
        self.batch = None;
        self.cache.clear();
        self.publish(transition);

        match self.transport.open(&self.identity.address) {
            Ok(handle) => {
                tracing::info!(link = %handle, epoch = self.machine.epoch(), "connecting");
                self.machine.attach(handle);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, "failed to open link");
                self.fail(&err);
                Err(err.into())
            }
        }
    }

    /// Ask the transport to tear the link down.
    ///
    /// Only effective when `Ready`; the state changes once the link-down
    /// event arrives. Anywhere else this is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the [`TransportError`] when the request cannot be started.
    #[tracing::instrument(skip(self), fields(address = %self.identity.address))]
    pub fn disconnect(&mut self) -> Result<(), TransportError> {
        let state = self.state();
        let link = match (state, self.link()) {
            (ConnectionState::Ready, Some(link)) => link,
            _ => {
                tracing::debug!(%state, "disconnect ignored, session is not ready");
                return Ok(());
            }
        };
        tracing::info!(%link, "disconnecting");
        self.transport.disconnect(link)
    }

    /// Ask for the remote signal strength. The result is published as
    /// [`SessionEvent::SignalStrength`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolStateError::NotReady`] unless `Ready`, or the
    /// [`TransportError`] when the request cannot be started.
    pub fn request_signal_strength(&mut self) -> Result<(), PlutoconError> {
        let link = self.ready_link()?;
        self.transport.read_signal_strength(link)?;
        Ok(())
    }

    /// Start a batch of reads.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolStateError::NotReady`] unless `Ready`, or
    /// [`ProtocolStateError::Busy`] while another batch is executing.
    pub fn reader(&mut self) -> Result<Reader<'_, T, O>, ProtocolStateError> {
        self.ensure_idle_link()?;
        Ok(Reader::new(self))
    }

    /// Start a batch of writes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolStateError::NotReady`] unless `Ready`, or
    /// [`ProtocolStateError::Busy`] while another batch is executing.
    pub fn editor(&mut self) -> Result<Editor<'_, T, O>, ProtocolStateError> {
        self.ensure_idle_link()?;
        Ok(Editor::new(self))
    }

    /// Feed one transport completion.
    ///
    /// Events tagged with a link other than the current one are dropped.
    pub fn handle_event(&mut self, LinkEvent { link, event }: LinkEvent) {
        if !self.machine.is_current(link) {
            tracing::warn!(%link, ?event, "dropping event for stale link");
            return;
        }

        match event {
            TransportEvent::LinkUp => self.on_link_up(link),
            TransportEvent::LinkDown => self.on_link_down(),
            TransportEvent::LinkError(err) => self.on_link_error(&err),
            TransportEvent::ServicesDiscovered(Ok(found)) => self.on_services(link, &found),
            TransportEvent::ServicesDiscovered(Err(err)) => {
                tracing::warn!(%err, "service discovery failed");
                self.fail(&err);
            }
            TransportEvent::CharacteristicRead {
                characteristic,
                result,
            } => self.on_operation(link, characteristic, OperationResult::Read(result)),
            TransportEvent::CharacteristicWritten {
                characteristic,
                result,
            } => self.on_operation(link, characteristic, OperationResult::Written(result)),
            TransportEvent::CharacteristicChanged {
                characteristic,
                value,
            } => self.on_notification(characteristic, value),
            TransportEvent::SignalStrength(Ok(rssi)) => {
                self.observer.notify(SessionEvent::SignalStrength(rssi));
            }
            TransportEvent::SignalStrength(Err(err)) => {
                tracing::warn!(%err, "signal strength read failed");
            }
        }
    }

    /// Device name.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Missing`] when it has not been read.
    pub fn name(&self) -> Result<String, DecodeError> {
        self.raw(Characteristic::DeviceName)
            .map(codec::decode_string)
    }

    /// iBeacon major.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when missing or shorter than two bytes.
    pub fn major(&self) -> Result<u16, DecodeError> {
        self.raw(Characteristic::Major).and_then(codec::decode_u16)
    }

    /// iBeacon minor.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when missing or shorter than two bytes.
    pub fn minor(&self) -> Result<u16, DecodeError> {
        self.raw(Characteristic::Minor).and_then(codec::decode_u16)
    }

    /// Advertising interval in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when missing or shorter than two bytes.
    pub fn advertising_interval(&self) -> Result<i16, DecodeError> {
        self.raw(Characteristic::AdvertisingInterval)
            .and_then(codec::decode_i16)
    }

    /// Broadcasting power in dBm. A single-byte payload (older firmware) is
    /// read as a signed byte.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when missing or empty.
    pub fn broadcasting_power(&self) -> Result<i16, DecodeError> {
        match self.raw(Characteristic::TxLevel)? {
            [byte] => Ok(i16::from(i8::from_be_bytes([*byte]))),
            bytes => codec::decode_i16(bytes),
        }
    }

    /// Battery voltage in millivolts.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when missing or shorter than two bytes.
    pub fn battery_voltage(&self) -> Result<i16, DecodeError> {
        self.raw(Characteristic::Battery).and_then(codec::decode_i16)
    }

    /// Raw software version string, e.g. `"v1.2.3"`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Missing`] when it has not been read.
    pub fn software_version(&self) -> Result<String, DecodeError> {
        self.raw(Characteristic::SoftwareVersion)
            .map(codec::decode_string)
    }

    /// Parsed software version.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Missing`] when it has not been read and
    /// [`DecodeError::MalformedVersion`] when it does not parse.
    pub fn software_version_detail(&self) -> Result<FirmwareVersion, DecodeError> {
        codec::parse_software_version(&self.software_version()?)
    }

    /// # Errors
    ///
    /// Returns [`DecodeError::Missing`] when it has not been read.
    pub fn hardware_version(&self) -> Result<String, DecodeError> {
        self.raw(Characteristic::HardwareVersion)
            .map(codec::decode_string)
    }

    /// # Errors
    ///
    /// Returns [`DecodeError::Missing`] when it has not been read.
    pub fn model_number(&self) -> Result<String, DecodeError> {
        self.raw(Characteristic::ModelNumber)
            .map(codec::decode_string)
    }

    /// # Errors
    ///
    /// Returns [`DecodeError::Missing`] when it has not been read.
    pub fn manufacturer_name(&self) -> Result<String, DecodeError> {
        self.raw(Characteristic::ManufacturerName)
            .map(codec::decode_string)
    }

    /// Beacon identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when missing or shorter than 16 bytes.
    pub fn identifier(&self) -> Result<Uuid, DecodeError> {
        self.raw(Characteristic::Identifier)
            .and_then(codec::decode_identifier)
    }

    /// Advertised packet format; `None` when missing or unknown.
    #[must_use]
    pub fn packet_format(&self) -> Option<PacketFormat> {
        self.raw(Characteristic::PacketFormat)
            .ok()
            .and_then(codec::decode_packet_format)
    }

    /// Latitude carried by the identifier, `0.0` when unavailable.
    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.identifier()
            .and_then(codec::decode_latitude)
            .unwrap_or_else(|err| {
                tracing::debug!(%err, "latitude unavailable");
                0.0
            })
    }

    /// Longitude carried by the identifier, `0.0` when unavailable.
    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.identifier()
            .and_then(codec::decode_longitude)
            .unwrap_or_else(|err| {
                tracing::debug!(%err, "longitude unavailable");
                0.0
            })
    }

    /// Every decoded property at once.
    #[must_use]
    pub fn snapshot(&self) -> BeaconSnapshot {
        BeaconSnapshot {
            address: self.identity.address.clone(),
            name: self.name().ok(),
            major: self.major().ok(),
            minor: self.minor().ok(),
            advertising_interval: self.advertising_interval().ok(),
            broadcasting_power: self.broadcasting_power().ok(),
            battery_voltage: self.battery_voltage().ok(),
            software_version: self.software_version_detail().ok(),
            hardware_version: self.hardware_version().ok(),
            model_number: self.model_number().ok(),
            manufacturer_name: self.manufacturer_name().ok(),
            identifier: self.identifier().ok(),
            packet_format: self.packet_format(),
            latitude: self.latitude(),
            longitude: self.longitude(),
        }
    }

    fn raw(&self, characteristic: Characteristic) -> Result<&[u8], DecodeError> {
        self.cache
            .get(characteristic.uuid())
            .ok_or(DecodeError::Missing(characteristic.uuid()))
    }

    fn ready_link(&self) -> Result<LinkHandle, ProtocolStateError> {
        match (self.state(), self.link()) {
            (ConnectionState::Ready, Some(link)) => Ok(link),
            (state, _) => Err(ProtocolStateError::NotReady(state)),
        }
    }

    fn ensure_idle_link(&self) -> Result<LinkHandle, ProtocolStateError> {
        let link = self.ready_link()?;
        if self.batch.is_some() {
            return Err(ProtocolStateError::Busy);
        }
        Ok(link)
    }

    /// Commit a batch built by a [`Reader`] or an [`Editor`].
    fn start_requested_batch(
        &mut self,
        mut queue: OperationQueue,
    ) -> Result<QueueProgress, PlutoconError> {
        let link = self.ensure_idle_link()?;
        if let Some(unknown) = queue
            .pending()
            .map(PendingOperation::characteristic)
            .find(|uuid| !self.cache.is_known(*uuid))
        {
            return Err(ProtocolStateError::UnknownCharacteristic(unknown).into());
        }

        let progress = queue.commit(&mut self.transport, link)?;
        tracing::debug!(operations = queue.len(), ?progress, "batch committed");
        if progress == QueueProgress::InFlight {
            self.batch = Some(ActiveBatch {
                queue,
                purpose: BatchPurpose::Requested,
            });
        }
        Ok(progress)
    }

    fn on_link_up(&mut self, link: LinkHandle) {
        let Some(transition) = self.machine.on_link_up() else {
            tracing::debug!(state = %self.state(), "ignoring unexpected link up");
            return;
        };
        tracing::info!(%link, "link up, discovering services");
        self.publish(transition);
        if let Err(err) = self.transport.discover_services(link) {
            tracing::warn!(%err, "failed to start service discovery");
            self.fail(&err);
        }
    }

    fn on_services(&mut self, link: LinkHandle, found: &[DiscoveredCharacteristic]) {
        if self.state() != ConnectionState::ServiceDiscovery {
            tracing::debug!(state = %self.state(), "ignoring unexpected discovery result");
            return;
        }
        for entry in found {
            self.cache.register(entry.characteristic);
        }

        let mut queue = OperationQueue::new();
        for characteristic in Characteristic::DEFAULT_READ_SET {
            if self.cache.is_known(characteristic.uuid()) {
                queue.enqueue(PendingOperation::read(characteristic.uuid()));
            }
        }
        tracing::info!(
            discovered = found.len(),
            reads = queue.len(),
            "services discovered, reading beacon properties"
        );
        queue.set_on_operation_complete(|outcome: &OperationOutcome| {
            tracing::trace!(
                characteristic = %outcome.characteristic,
                ok = outcome.result.is_ok(),
                "initial read item finished"
            );
        });

        match queue.commit(&mut self.transport, link) {
            Ok(QueueProgress::InFlight) => {
                self.batch = Some(ActiveBatch {
                    queue,
                    purpose: BatchPurpose::InitialRead,
                });
            }
            Ok(QueueProgress::Drained) => self.become_ready(),
            Err(err) => {
                // a fresh queue with a callback never refuses to commit
                tracing::error!(%err, "failed to commit initial read");
            }
        }
    }

    fn on_operation(
        &mut self,
        link: LinkHandle,
        characteristic: Uuid,
        result: OperationResult,
    ) {
        let Some(batch) = self.batch.as_mut() else {
            tracing::warn!(%characteristic, "dropping operation result without active batch");
            return;
        };
        let progress = batch.queue.on_transport_callback(
            &mut self.transport,
            link,
            &mut self.cache,
            characteristic,
            result,
        );
        if progress != Some(QueueProgress::Drained) {
            return;
        }

        let purpose = batch.purpose;
        self.batch = None;
        match purpose {
            BatchPurpose::InitialRead => self.become_ready(),
            BatchPurpose::Requested => tracing::debug!("batch drained"),
        }
    }

    fn on_notification(&mut self, characteristic: Uuid, value: Vec<u8>) {
        match self.state() {
            ConnectionState::ServiceDiscovery | ConnectionState::Ready => {
                tracing::debug!(%characteristic, len = value.len(), "characteristic changed");
                self.cache.put(characteristic, value);
            }
            state => tracing::debug!(%state, %characteristic, "ignoring notification"),
        }
    }

    fn on_link_error(&mut self, err: &TransportError) {
        if self.state() == ConnectionState::Ready {
            tracing::warn!(%err, "link lost");
            self.on_link_down();
        } else {
            tracing::warn!(%err, "link failed while connecting");
            self.fail(err);
        }
    }

    fn on_link_down(&mut self) {
        if let Some(termination) = self.machine.link_down() {
            tracing::info!(from = %termination.transition.from, "link down");
            self.terminate(termination, DisconnectReason::LinkDown);
        }
    }

    fn fail(&mut self, err: &TransportError) {
        if let Some(termination) = self.machine.fail() {
            let cause = error_chain(err);
            tracing::warn!(%cause, from = %termination.transition.from, "connection failed");
            self.terminate(termination, DisconnectReason::Failed { cause });
        }
    }

    fn terminate(&mut self, termination: Termination, reason: DisconnectReason) {
        self.batch = None;
        self.cache.clear();
        self.identity = DeviceIdentity::new(std::mem::take(&mut self.identity.address));
        if let Some(link) = termination.link {
            self.transport.close(link);
        }
        self.publish(termination.transition);
        self.observer.notify(SessionEvent::Disconnected { reason });
    }

    fn become_ready(&mut self) {
        let Some(transition) = self.machine.mark_ready() else {
            return;
        };
        self.identity.name = self.name().ok();
        self.identity.major = self.major().ok();
        self.identity.minor = self.minor().ok();
        tracing::info!(
            name = ?self.identity.name,
            major = ?self.identity.major,
            minor = ?self.identity.minor,
            "session ready"
        );
        self.publish(transition);
        self.observer
            .notify(SessionEvent::Connected(self.identity.clone()));
    }

    fn publish(&self, Transition { from, to }: Transition) {
        self.observer.notify(SessionEvent::StateChanged { from, to });
    }
}

impl<T, O> std::fmt::Debug for Session<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("machine", &self.machine)
            .field("cached", &self.cache.len())
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
