//! # In-Memory Bus
//!
//! Single-process implementation of [`PubSubTransport`].

use crate::message::BusMessage;
use crate::pattern::ChannelPattern;
use crate::subscriber::{Subscription, SubscriptionTable};
use crate::transport::{PubSubTransport, TransportError};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// In-memory implementation of the pub/sub bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics;
/// each subscription filters the shared feed by its pattern.
/// Suitable for single-node operation; distributed deployments would use
/// a different implementation (e.g., Redis, NATS).
pub struct InMemoryBus {
    /// Broadcast sender for messages.
    sender: broadcast::Sender<BusMessage>,

    /// Active subscription count by pattern.
    subscriptions: SubscriptionTable,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Set once the bus stops accepting traffic.
    closed: AtomicBool,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            messages_published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Stop accepting publishes and new subscriptions.
    ///
    /// Existing subscriptions keep draining whatever is already buffered.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        debug!("In-memory bus closed");
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Get the number of active subscription handles.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of distinct patterns with at least one subscription.
    #[must_use]
    pub fn active_patterns(&self) -> usize {
        self.subscriptions.read().map(|subs| subs.len()).unwrap_or(0)
    }

    /// Get the total number of messages published.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Count subscriptions whose pattern covers `channel`.
    fn matching_subscribers(&self, channel: &str) -> usize {
        let Ok(subs) = self.subscriptions.read() else {
            return 0;
        };
        subs.iter()
            .filter(|(pattern, _)| pattern.matches(channel))
            .map(|(_, count)| *count)
            .sum()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PubSubTransport for InMemoryBus {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<usize, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        self.messages_published.fetch_add(1, Ordering::Relaxed);
        let matched = self.matching_subscribers(channel);
        let bytes = payload.len();

        match self.sender.send(BusMessage::new(channel, payload)) {
            Ok(_) => {
                debug!(channel = channel, bytes = bytes, matched = matched, "Message published");
                Ok(matched)
            }
            Err(_) => {
                // No receivers at all - message is dropped
                debug!(channel = channel, bytes = bytes, "Message dropped (no subscribers)");
                Ok(0)
            }
        }
    }

    async fn subscribe(&self, pattern: ChannelPattern) -> Result<Subscription, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let receiver = self.sender.subscribe();

        match self.subscriptions.write() {
            Ok(mut subs) => *subs.entry(pattern.clone()).or_insert(0) += 1,
            Err(_) => warn!(pattern = %pattern, "Subscription table poisoned, not tracking"),
        }

        debug!(pattern = %pattern, "New subscription created");

        Ok(Subscription::new(
            receiver,
            pattern,
            Arc::clone(&self.subscriptions),
        ))
    }
}
