//! Connection state — where a session is in its lifecycle.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a beacon session.
///
/// ```text
/// Idle -> Connecting -> ServiceDiscovery -> Ready -> Disconnected
///              \               \
///               +---------------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    ServiceDiscovery,
    Ready,
    Disconnected,
    Failed,
}

impl ConnectionState {
    /// Whether `connect()` may start a new attempt from this state.
    #[must_use]
    pub fn can_connect(self) -> bool {
        matches!(self, Self::Idle | Self::Disconnected | Self::Failed)
    }

    /// Whether a connection attempt is underway but not yet ready.
    #[must_use]
    pub fn is_establishing(self) -> bool {
        matches!(self, Self::Connecting | Self::ServiceDiscovery)
    }

    /// Whether the session ended and needs a new `connect()`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::ServiceDiscovery => f.write_str("service_discovery"),
            Self::Ready => f.write_str("ready"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::Failed => f.write_str("failed"),
        }
    }
}
