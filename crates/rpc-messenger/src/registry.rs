//! # Handler Registry
//!
//! One handler factory per logical channel. Built at setup time, then moved
//! into the dispatcher, after which it is read-only and shared without locks.

use crate::domain::{LogicalChannel, MessengerError};
use crate::ports::{HandlerFactory, MessageHandler};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Logical channel → handler factory.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: BTreeMap<LogicalChannel, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a factory to a channel.
    ///
    /// Fails with `DuplicateRegistration` if the channel already has a
    /// handler; the existing registration stays active.
    pub fn register(
        &mut self,
        channel: LogicalChannel,
        factory: HandlerFactory,
    ) -> Result<&mut Self, MessengerError> {
        if self.handlers.contains_key(&channel) {
            return Err(MessengerError::DuplicateRegistration(channel.to_string()));
        }

        debug!(channel = %channel, "Registered message handler");
        self.handlers.insert(channel, factory);
        Ok(self)
    }

    /// Register a handler type; a fresh instance serves every request.
    pub fn register_handler<H>(&mut self, channel: &str) -> Result<&mut Self, MessengerError>
    where
        H: MessageHandler + Default + 'static,
    {
        let channel = LogicalChannel::new(channel)?;
        self.register(channel, Arc::new(|| Arc::new(H::default()) as Arc<dyn MessageHandler>))
    }

    /// Register one instance that serves every request (and so shares its
    /// state across concurrent invocations).
    pub fn register_shared<H>(
        &mut self,
        channel: &str,
        handler: Arc<H>,
    ) -> Result<&mut Self, MessengerError>
    where
        H: MessageHandler + 'static,
    {
        let channel = LogicalChannel::new(channel)?;
        self.register(
            channel,
            Arc::new(move || Arc::clone(&handler) as Arc<dyn MessageHandler>),
        )
    }

    /// Factory bound to `channel`, if any.
    pub fn resolve(&self, channel: &LogicalChannel) -> Option<&HandlerFactory> {
        self.handlers.get(channel)
    }

    /// Registered channel names, in sorted order.
    pub fn channels(&self) -> impl Iterator<Item = &LogicalChannel> {
        self.handlers.keys()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("channels", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
