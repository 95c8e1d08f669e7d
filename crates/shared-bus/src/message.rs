//! # Bus Messages
//!
//! The unit of delivery on the bus: a concrete channel name plus an opaque
//! byte payload. The bus never looks inside the payload.

use bytes::Bytes;
use std::sync::Arc;

/// A message delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Concrete channel the message was published to.
    pub channel: Arc<str>,
    /// Opaque payload.
    pub payload: Bytes,
}

impl BusMessage {
    /// Create a new message.
    pub fn new(channel: impl Into<Arc<str>>, payload: impl Into<Bytes>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Channel name as a string slice.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether the payload carries no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
