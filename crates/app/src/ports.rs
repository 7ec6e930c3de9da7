//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the session layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod observer;
pub mod transport;

pub use observer::{DisconnectReason, SessionEvent, SessionObserver};
pub use transport::{DiscoveredCharacteristic, LinkEvent, LinkHandle, Transport, TransportEvent};
