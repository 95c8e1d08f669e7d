//! # Transport Port
//!
//! The two operations the messaging core needs from a pub/sub system.
//! `InMemoryBus` is the in-process implementation; a networked broker
//! (Redis, NATS, ...) implements the same trait and feeds its deliveries into
//! a [`Subscription`] via [`Subscription::from_receiver`].

use crate::pattern::ChannelPattern;
use crate::subscriber::Subscription;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failures of the pub/sub transport itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport was shut down.
    #[error("transport closed")]
    Closed,

    /// A publish could not be handed to the transport.
    #[error("publish to '{channel}' failed: {reason}")]
    Publish { channel: String, reason: String },

    /// A subscription could not be established.
    #[error("subscribe to '{pattern}' failed: {reason}")]
    Subscribe { pattern: String, reason: String },
}

/// Publish/subscribe transport.
///
/// Delivery contract: each published message reaches every subscription
/// whose pattern matches at the time of publishing, once. No ordering is
/// guaranteed across channels.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Publish `payload` to a concrete channel.
    ///
    /// # Returns
    ///
    /// The number of subscriptions the message was routed to.
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<usize, TransportError>;

    /// Subscribe to a literal channel or glob pattern.
    ///
    /// Messages published after this returns are delivered to the handle.
    async fn subscribe(&self, pattern: ChannelPattern) -> Result<Subscription, TransportError>;
}
