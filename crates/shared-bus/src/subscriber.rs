//! # Subscriptions
//!
//! Receiving side of the bus.

use crate::message::BusMessage;
use crate::pattern::ChannelPattern;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Active subscriptions by pattern, shared between the bus and its handles.
pub(crate) type SubscriptionTable = Arc<RwLock<HashMap<ChannelPattern, usize>>>;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was closed.
    #[error("Message bus closed")]
    Closed,
}

enum Source {
    /// Shared broadcast feed of the in-memory bus, filtered locally.
    Bus(broadcast::Receiver<BusMessage>),
    /// Already-routed deliveries from an external transport.
    Routed(mpsc::Receiver<BusMessage>),
}

/// A subscription handle for receiving messages.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    source: Source,

    /// Pattern this subscription listens to.
    pattern: ChannelPattern,

    /// Subscription tracking of the owning bus (for cleanup).
    table: Option<SubscriptionTable>,
}

impl Subscription {
    /// Create a subscription on the in-memory bus feed.
    pub(crate) fn new(
        receiver: broadcast::Receiver<BusMessage>,
        pattern: ChannelPattern,
        table: SubscriptionTable,
    ) -> Self {
        Self {
            source: Source::Bus(receiver),
            pattern,
            table: Some(table),
        }
    }

    /// Wrap deliveries that an external transport has already routed to
    /// this pattern.
    pub fn from_receiver(receiver: mpsc::Receiver<BusMessage>, pattern: ChannelPattern) -> Self {
        Self {
            source: Source::Routed(receiver),
            pattern,
            table: None,
        }
    }

    /// Receive the next message that matches the pattern.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next matching message
    /// - `None` - The feed was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<BusMessage> {
        match &mut self.source {
            Source::Routed(rx) => rx.recv().await,
            Source::Bus(rx) => loop {
                let message = match rx.recv().await {
                    Ok(m) => m,
                    Err(broadcast::error::RecvError::Closed) => return None,
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        debug!(
                            pattern = %self.pattern,
                            lagged = count,
                            "Subscriber lagged, some messages dropped"
                        );
                        continue;
                    }
                };

                if self.pattern.matches(message.channel()) {
                    return Some(message);
                }
            },
        }
    }

    /// Try to receive the next message without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available and matched
    /// - `Ok(None)` - No message available (would block)
    /// - `Err(SubscriptionError::Closed)` - The feed was closed
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, SubscriptionError> {
        match &mut self.source {
            Source::Routed(rx) => match rx.try_recv() {
                Ok(m) => Ok(Some(m)),
                Err(mpsc::error::TryRecvError::Empty) => Ok(None),
                Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
            },
            Source::Bus(rx) => loop {
                let message = match rx.try_recv() {
                    Ok(m) => m,
                    Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                    Err(broadcast::error::TryRecvError::Closed) => {
                        return Err(SubscriptionError::Closed)
                    }
                    Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                };

                if self.pattern.matches(message.channel()) {
                    return Ok(Some(message));
                }
            },
        }
    }

    /// Get the pattern for this subscription.
    #[must_use]
    pub fn pattern(&self) -> &ChannelPattern {
        &self.pattern
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(table) = &self.table else {
            return;
        };
        let Ok(mut subs) = table.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.pattern) else {
            debug!(pattern = %self.pattern, "Subscription dropped");
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.pattern);
        }
        debug!(pattern = %self.pattern, "Subscription dropped");
    }
}
