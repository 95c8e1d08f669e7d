//! Messenger error types.
//!
//! Errors a caller can act on are returned from `send`/`query` and setup
//! calls. Errors with no addressable caller (undecodable requests, failed
//! reply publishes) are logged by the dispatcher and never surface here.

use crate::domain::config::ConfigError;
use crate::domain::envelope::EncodeError;
use crate::domain::naming::NamingError;
use shared_bus::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Errors from messaging operations.
#[derive(Debug, Error)]
pub enum MessengerError {
    /// Publish or subscribe failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The outgoing envelope could not be serialized.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The handler on the other side reported a failure.
    #[error("message handler failed: {message}")]
    RemoteHandler { message: String },

    /// No response arrived before the deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The caller canceled the query.
    #[error("query canceled")]
    Canceled,

    /// The request payload could not be converted to JSON.
    #[error("request payload is not serializable: {0}")]
    RequestPayload(#[source] serde_json::Error),

    /// The response payload does not have the expected shape.
    #[error("response payload has an unexpected shape: {0}")]
    ResponsePayload(#[source] serde_json::Error),

    /// A second handler was registered for a logical channel.
    #[error("a message handler has already been registered for channel '{0}'")]
    DuplicateRegistration(String),

    /// The response subscription ended while the call was waiting.
    #[error("response subscription closed")]
    Disconnected,

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MessengerError {
    /// Whether the error came from the remote handler.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteHandler { .. })
    }

    /// Whether the error is local to the pending call (timeout or cancel).
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Canceled)
    }
}

/// Result alias for messenger operations.
pub type Result<T, E = MessengerError> = std::result::Result<T, E>;
