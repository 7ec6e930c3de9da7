//! Observer port — lifecycle notifications published by a session.

use plutocon_domain::device::DeviceIdentity;
use plutocon_domain::state::ConnectionState;

/// Why a session reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The link went down after it was opened.
    LinkDown,
    /// Connecting or discovery failed; `cause` is the rendered error chain.
    Failed { cause: String },
}

/// Notification emitted by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Any state transition.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// The initial read finished; the session is ready.
    Connected(DeviceIdentity),
    /// The session reached `Disconnected` or `Failed`. Always emitted once
    /// per terminal transition.
    Disconnected { reason: DisconnectReason },
    /// Result of a signal strength request, in dBm.
    SignalStrength(i16),
}

/// Receives [`SessionEvent`]s.
///
/// Called synchronously from the session; implementations must not block.
pub trait SessionObserver {
    /// Deliver one event.
    fn notify(&self, event: SessionEvent);
}

impl<T: SessionObserver + ?Sized> SessionObserver for std::sync::Arc<T> {
    fn notify(&self, event: SessionEvent) {
        (**self).notify(event);
    }
}
