//! Shared fakes for unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use plutocon_domain::characteristic::Characteristic;
use plutocon_domain::error::TransportError;
use uuid::Uuid;

use crate::ports::{
    DiscoveredCharacteristic, LinkEvent, LinkHandle, SessionEvent, SessionObserver, Transport,
    TransportEvent,
};
use crate::session::Session;

pub(crate) const ADDRESS: &str = "D0:39:72:A4:0B:7C";

/// Service UUID the fake peripheral groups characteristics under.
pub(crate) const SERVICE: Uuid = Uuid::from_u128(0x0000_0100_4b54_4348_8000_504c_5554_4f4e);

/// Every request a session made, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    Open(String),
    Discover(LinkHandle),
    Read(LinkHandle, Uuid),
    Write(LinkHandle, Uuid, Vec<u8>),
    SignalStrength(LinkHandle),
    Disconnect(LinkHandle),
    Close(LinkHandle),
}

/// Transport that records requests and never completes anything by itself.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    pub requests: Vec<Request>,
    pub fail_open: bool,
    pub fail_discover: bool,
    pub reject: HashSet<Uuid>,
    next_link: u64,
}

impl FakeTransport {
    pub(crate) fn reads(&self) -> Vec<Uuid> {
        self.requests
            .iter()
            .filter_map(|request| match request {
                Request::Read(_, uuid) => Some(*uuid),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.requests
            .iter()
            .filter_map(|request| match request {
                Request::Write(_, uuid, payload) => Some((*uuid, payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn last(&self) -> Option<&Request> {
        self.requests.last()
    }
}

impl Transport for FakeTransport {
    fn open(&mut self, address: &str) -> Result<LinkHandle, TransportError> {
        self.requests.push(Request::Open(address.to_owned()));
        if self.fail_open {
            return Err(TransportError::Link("adapter powered off".into()));
        }
        self.next_link += 1;
        Ok(LinkHandle::new(self.next_link))
    }

    fn discover_services(&mut self, link: LinkHandle) -> Result<(), TransportError> {
        self.requests.push(Request::Discover(link));
        if self.fail_discover {
            return Err(TransportError::Discovery("gatt busy".into()));
        }
        Ok(())
    }

    fn read_characteristic(
        &mut self,
        link: LinkHandle,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        self.requests.push(Request::Read(link, characteristic));
        if self.reject.contains(&characteristic) {
            return Err(TransportError::Read {
                characteristic,
                source: "rejected".into(),
            });
        }
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        link: LinkHandle,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError> {
        self.requests
            .push(Request::Write(link, characteristic, value.to_vec()));
        if self.reject.contains(&characteristic) {
            return Err(TransportError::Write {
                characteristic,
                source: "rejected".into(),
            });
        }
        Ok(())
    }

    fn read_signal_strength(&mut self, link: LinkHandle) -> Result<(), TransportError> {
        self.requests.push(Request::SignalStrength(link));
        Ok(())
    }

    fn disconnect(&mut self, link: LinkHandle) -> Result<(), TransportError> {
        self.requests.push(Request::Disconnect(link));
        Ok(())
    }

    fn close(&mut self, link: LinkHandle) {
        self.requests.push(Request::Close(link));
    }
}

/// Observer that keeps every event for later assertions.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingObserver {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn disconnect_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, SessionEvent::Disconnected { .. }))
            .count()
    }
}

impl SessionObserver for RecordingObserver {
    fn notify(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub(crate) type TestSession = Session<FakeTransport, RecordingObserver>;

pub(crate) fn new_session() -> (TestSession, RecordingObserver) {
    let observer = RecordingObserver::default();
    let session = Session::new(ADDRESS, FakeTransport::default(), observer.clone());
    (session, observer)
}

/// Discovery result listing every characteristic of the schema.
pub(crate) fn full_discovery() -> Vec<DiscoveredCharacteristic> {
    Characteristic::DEFAULT_READ_SET
        .iter()
        .map(|characteristic| DiscoveredCharacteristic {
            service: SERVICE,
            characteristic: characteristic.uuid(),
            descriptors: Vec::new(),
        })
        .collect()
}

/// Plausible raw payload for each property.
pub(crate) fn sample_value(characteristic: Characteristic) -> Vec<u8> {
    match characteristic {
        Characteristic::DeviceName => b"PLUTOCON".to_vec(),
        Characteristic::Major => vec![0x00, 0x07],
        Characteristic::Minor => vec![0x01, 0x00],
        Characteristic::AdvertisingInterval => vec![0x03, 0xE8],
        Characteristic::TxLevel => vec![0xFF, 0xF8],
        Characteristic::Battery => vec![0x0B, 0xB8],
        Characteristic::SoftwareVersion => b"v1.2.3".to_vec(),
        Characteristic::HardwareVersion => b"r2".to_vec(),
        Characteristic::ModelNumber => b"PC-01".to_vec(),
        Characteristic::ManufacturerName => b"KongTech".to_vec(),
        Characteristic::Identifier => Uuid::parse_str("12345678-0037-5665-4301-27012345abcd")
            .unwrap()
            .as_bytes()
            .to_vec(),
        Characteristic::PacketFormat => vec![0x00, 0x59],
    }
}

pub(crate) fn event(link: LinkHandle, event: TransportEvent) -> LinkEvent {
    LinkEvent::new(link, event)
}

pub(crate) fn read_ok(link: LinkHandle, characteristic: Characteristic) -> LinkEvent {
    event(
        link,
        TransportEvent::CharacteristicRead {
            characteristic: characteristic.uuid(),
            result: Ok(sample_value(characteristic)),
        },
    )
}

/// Drive a fresh session through connect, discovery and the initial read.
pub(crate) fn ready_session() -> (TestSession, RecordingObserver, LinkHandle) {
    let (mut session, observer) = new_session();
    session.connect().unwrap();
    let link = session.link().unwrap();

    session.handle_event(event(link, TransportEvent::LinkUp));
    session.handle_event(event(
        link,
        TransportEvent::ServicesDiscovered(Ok(full_discovery())),
    ));
    for characteristic in Characteristic::DEFAULT_READ_SET {
        session.handle_event(read_ok(link, characteristic));
    }
    (session, observer, link)
}
