//! Common error types used across the workspace.
//!
//! Each concern has its own typed error and the umbrella [`PlutoconError`]
//! converts from all of them via `#[from]`. There are no `String` catch-all
//! variants: adapter failures travel as boxed sources.

use crate::characteristic::Characteristic;
use crate::state::ConnectionState;

/// Boxed error coming from a transport implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error for session operations.
#[derive(Debug, thiserror::Error)]
pub enum PlutoconError {
    #[error("transport error")]
    Transport(#[from] TransportError),

    #[error("decode error")]
    Decode(#[from] DecodeError),

    #[error("encode error")]
    Encode(#[from] EncodeError),

    #[error("protocol state error")]
    State(#[from] ProtocolStateError),
}

/// Failures reported by (or while talking to) the BLE transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The link could not be opened or was lost abnormally.
    #[error("link failure")]
    Link(#[source] BoxError),

    /// Service discovery failed.
    #[error("service discovery failed")]
    Discovery(#[source] BoxError),

    /// A characteristic read failed.
    #[error("read of characteristic {characteristic} failed")]
    Read {
        characteristic: uuid::Uuid,
        #[source]
        source: BoxError,
    },

    /// A characteristic write failed.
    #[error("write of characteristic {characteristic} failed")]
    Write {
        characteristic: uuid::Uuid,
        #[source]
        source: BoxError,
    },

    /// Reading the remote signal strength failed.
    #[error("signal strength read failed")]
    SignalStrength(#[source] BoxError),

    /// The transport does not know the given link handle.
    #[error("unknown link {0}")]
    UnknownLink(u64),
}

/// A raw payload could not be decoded into a typed value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Nothing has been read for the characteristic yet.
    #[error("no value cached for characteristic {0}")]
    Missing(uuid::Uuid),

    /// The payload is shorter than the encoding requires.
    #[error("payload must be at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// The software version string is not `<prefix>major.minor.patch`.
    #[error("malformed software version {0:?}")]
    MalformedVersion(String),

    /// The identifier does not carry decimal coordinate digits.
    #[error("identifier {0} does not encode a coordinate")]
    InvalidCoordinate(uuid::Uuid),
}

/// A value could not be encoded into a characteristic payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// A numeric value lies outside the range the device accepts.
    #[error("{field} {value} is out of range")]
    OutOfRange { field: &'static str, value: f64 },

    /// The device name is empty or too long.
    #[error("device name must be 1 to {max} bytes, got {actual}")]
    InvalidName { max: usize, actual: usize },

    /// No identifier is known to carry the coordinates.
    #[error("no identifier available to carry coordinates")]
    MissingIdentifier,

    /// The firmware does not accept writes to this property.
    #[error("{0} is read-only")]
    ReadOnly(Characteristic),
}

/// An operation was attempted in a state that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolStateError {
    /// Reader/editor requested before the session became ready.
    #[error("session is not ready (state: {0})")]
    NotReady(ConnectionState),

    /// Another batch is still executing on the link.
    #[error("another operation batch is in progress")]
    Busy,

    /// `connect()` called while a connection attempt is in progress.
    #[error("connection attempt already in progress (state: {0})")]
    AlreadyConnecting(ConnectionState),

    /// `connect()` called while the session is ready.
    #[error("session is already connected")]
    AlreadyConnected,

    /// A batch was committed without a completion callback.
    #[error("operation batch committed without a completion callback")]
    MissingCompletionCallback,

    /// The peripheral did not expose the requested characteristic.
    #[error("characteristic {0} was not discovered on the peripheral")]
    UnknownCharacteristic(uuid::Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_decode_errors() {
        let err = DecodeError::TooShort {
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "payload must be at least 2 bytes, got 1");

        let err = DecodeError::MalformedVersion("v1.2".to_owned());
        assert_eq!(err.to_string(), "malformed software version \"v1.2\"");
    }

    #[test]
    fn should_display_state_errors() {
        let err = ProtocolStateError::NotReady(ConnectionState::Connecting);
        assert_eq!(err.to_string(), "session is not ready (state: connecting)");
        assert_eq!(
            ProtocolStateError::Busy.to_string(),
            "another operation batch is in progress"
        );
    }

    #[test]
    fn should_keep_source_on_transport_error() {
        let err = TransportError::Read {
            characteristic: uuid::Uuid::nil(),
            source: "gatt status 133".into(),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "gatt status 133");
    }

    #[test]
    fn should_convert_into_umbrella_error() {
        let err: PlutoconError = ProtocolStateError::Busy.into();
        assert!(matches!(err, PlutoconError::State(ProtocolStateError::Busy)));

        let err: PlutoconError = DecodeError::Missing(uuid::Uuid::nil()).into();
        assert!(matches!(err, PlutoconError::Decode(_)));
    }
}
