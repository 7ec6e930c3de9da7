//! Connection state machine.
//!
//! Owns the [`ConnectionState`] and the handle of the current link. Every
//! successful [`begin_connect`](ConnectionStateMachine::begin_connect) bumps
//! the epoch counter and forgets the previous handle, so transport events
//! tagged with any handle other than the one attached afterwards are stale.
//!
//! The machine only decides transitions. Side effects (transport requests,
//! cache and queue cleanup, observer notifications) belong to the session.

use plutocon_domain::error::ProtocolStateError;
use plutocon_domain::state::ConnectionState;

use crate::ports::LinkHandle;

/// A state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// A transition into `Disconnected` or `Failed`, with the link to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub transition: Transition,
    pub link: Option<LinkHandle>,
}

#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    link: Option<LinkHandle>,
    epoch: u64,
}

impl ConnectionStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current link, if one is attached.
    #[must_use]
    pub fn link(&self) -> Option<LinkHandle> {
        self.link
    }

    /// Number of connection attempts started so far.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether `handle` is the link of the current attempt.
    #[must_use]
    pub fn is_current(&self, handle: LinkHandle) -> bool {
        self.link == Some(handle)
    }

    /// Start a new attempt: `Idle`/`Disconnected`/`Failed` → `Connecting`.
    ///
    /// Any previous link is forgotten and the epoch advances.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolStateError::AlreadyConnected`] when ready and
    /// [`ProtocolStateError::AlreadyConnecting`] while an attempt is underway.
    pub fn begin_connect(&mut self) -> Result<Transition, ProtocolStateError> {
        match self.state {
            state if state.can_connect() => {
                self.epoch += 1;
                self.link = None;
                Ok(self.move_to(ConnectionState::Connecting))
            }
            ConnectionState::Ready => Err(ProtocolStateError::AlreadyConnected),
            state => Err(ProtocolStateError::AlreadyConnecting(state)),
        }
    }

    /// Bind the handle returned by the transport to the current attempt.
    pub fn attach(&mut self, handle: LinkHandle) {
        self.link = Some(handle);
    }

    /// `Connecting` → `ServiceDiscovery`.
    pub fn on_link_up(&mut self) -> Option<Transition> {
        (self.state == ConnectionState::Connecting)
            .then(|| self.move_to(ConnectionState::ServiceDiscovery))
    }

    /// `ServiceDiscovery` → `Ready`.
    pub fn mark_ready(&mut self) -> Option<Transition> {
        (self.state == ConnectionState::ServiceDiscovery)
            .then(|| self.move_to(ConnectionState::Ready))
    }

    /// `Connecting`/`ServiceDiscovery` → `Failed`. Detaches the link.
    pub fn fail(&mut self) -> Option<Termination> {
        self.state
            .is_establishing()
            .then(|| self.terminate(ConnectionState::Failed))
    }

    /// `Connecting`/`ServiceDiscovery`/`Ready` → `Disconnected`. Detaches
    /// the link.
    pub fn link_down(&mut self) -> Option<Termination> {
        (self.state.is_establishing() || self.state == ConnectionState::Ready)
            .then(|| self.terminate(ConnectionState::Disconnected))
    }

    fn terminate(&mut self, to: ConnectionState) -> Termination {
        let link = self.link.take();
        Termination {
            transition: self.move_to(to),
            link,
        }
    }

    fn move_to(&mut self, to: ConnectionState) -> Transition {
        let from = std::mem::replace(&mut self.state, to);
        Transition { from, to }
    }
}
