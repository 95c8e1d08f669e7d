//! # Handler Dispatcher (server side)
//!
//! Listens on the request pattern of every registered logical channel and
//! routes each request to its handler, then publishes exactly one response
//! back to the requester.
//!
//! ```text
//!   {channel}:req-*  ──▶ pump ──spawn──▶ decode ──▶ resolve ──▶ handle
//!                                                                 │
//!   {channel}:res-{clientId} ◀──────── publish ResponseEnvelope ◀─┘
//! ```
//!
//! Requests that cannot be answered (undecodable, no handler, unusable client
//! id) are logged and dropped. Reply publish failures are logged and never
//! retried.

use crate::domain::{
    ChannelNaming, ClientId, LogicalChannel, MessengerError, RequestEnvelope, ResponseEnvelope,
};
use crate::ports::PubSubTransport;
use crate::registry::HandlerRegistry;
use crate::task::AbortOnDrop;
use shared_bus::{BusMessage, Subscription};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Error message replied when a handler panics.
pub const HANDLER_PANICKED: &str = "handler panicked";

/// Why a request was dropped without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Payload was not a valid request envelope
    Undecodable,
    /// No handler is registered for the channel
    NoHandler,
    /// The client id cannot address a response channel
    InvalidClient,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Undecodable => "undecodable request",
            Self::NoHandler => "no handler registered",
            Self::InvalidClient => "invalid client id",
        };
        f.write_str(reason)
    }
}

/// Result of handling one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A response was published (`success` tells which kind)
    Replied { success: bool },
    /// A response was produced but could not be published
    ReplyFailed,
    /// No response was produced
    Dropped(DropReason),
}

/// Routes requests of the registered channels to their handlers.
pub struct HandlerDispatcher {
    transport: Arc<dyn PubSubTransport>,
    registry: Arc<HandlerRegistry>,
    naming: ChannelNaming,
}

impl HandlerDispatcher {
    pub fn new(
        transport: Arc<dyn PubSubTransport>,
        registry: HandlerRegistry,
        naming: ChannelNaming,
    ) -> Self {
        Self {
            transport,
            registry: Arc::new(registry),
            naming,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn naming(&self) -> &ChannelNaming {
        &self.naming
    }

    /// Subscribe to every registered channel and start dispatching.
    ///
    /// Fails if any subscription fails; pumps already started are stopped.
    pub async fn start(self) -> Result<DispatcherHandle, MessengerError> {
        let this = Arc::new(self);
        let mut pumps = Vec::with_capacity(this.registry.len());

        for channel in this.registry.channels() {
            let pattern = this.naming.request_pattern(channel);
            let subscription = this.transport.subscribe(pattern.clone()).await?;
            debug!(channel = %channel, pattern = %pattern, "Subscribed to requests");

            pumps.push(AbortOnDrop(tokio::spawn(request_pump(
                Arc::clone(&this),
                channel.clone(),
                subscription,
            ))));
        }

        info!(channels = pumps.len(), "Handler dispatcher started");
        Ok(DispatcherHandle { pumps })
    }

    /// Handle one inbound request message for `channel`.
    pub async fn dispatch(&self, channel: &LogicalChannel, message: &BusMessage) -> DispatchOutcome {
        let request = match RequestEnvelope::decode(&message.payload) {
            Ok(request) => request,
            Err(err) => {
                warn!(
                    channel = %message.channel(),
                    error = %err,
                    "Dropping request: {}",
                    DropReason::Undecodable
                );
                return DispatchOutcome::Dropped(DropReason::Undecodable);
            }
        };

        let client_id = match ClientId::new(request.client_id.as_str()) {
            Ok(client_id) => client_id,
            Err(err) => {
                warn!(
                    correlation_id = %request.request_id,
                    channel = %channel,
                    error = %err,
                    "Dropping request: {}",
                    DropReason::InvalidClient
                );
                return DispatchOutcome::Dropped(DropReason::InvalidClient);
            }
        };

        let Some(factory) = self.registry.resolve(channel) else {
            warn!(
                correlation_id = %request.request_id,
                channel = %channel,
                "Dropping request: {}",
                DropReason::NoHandler
            );
            return DispatchOutcome::Dropped(DropReason::NoHandler);
        };

        debug!(
            correlation_id = %request.request_id,
            channel = %channel,
            client_id = %client_id,
            "Received request"
        );

        // Run on a separate task so a panic becomes a failure reply
        let handler = factory();
        let payload = request.payload;
        let result = tokio::spawn(async move { handler.handle(payload).await }).await;

        let response = match result {
            Ok(Ok(payload)) => ResponseEnvelope::ok(request.request_id, payload),
            Ok(Err(err)) => {
                debug!(correlation_id = %request.request_id, error = %err, "Handler failed");
                ResponseEnvelope::failure(request.request_id, format!("{err:#}"))
            }
            Err(join) => {
                warn!(correlation_id = %request.request_id, error = %join, "Handler did not complete");
                ResponseEnvelope::failure(request.request_id, HANDLER_PANICKED)
            }
        };

        self.reply(channel, &client_id, response).await
    }

    async fn reply(
        &self,
        channel: &LogicalChannel,
        client_id: &ClientId,
        response: ResponseEnvelope,
    ) -> DispatchOutcome {
        let response_channel = self.naming.response_channel(channel, client_id);
        let success = response.success;

        let bytes = match response.encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    correlation_id = %response.reply_to,
                    channel = %response_channel,
                    error = %err,
                    "Failed to encode response"
                );
                return DispatchOutcome::ReplyFailed;
            }
        };

        match self.transport.publish(&response_channel, bytes).await {
            Ok(receivers) => {
                debug!(
                    correlation_id = %response.reply_to,
                    channel = %response_channel,
                    success,
                    receivers,
                    "Published response"
                );
                DispatchOutcome::Replied { success }
            }
            Err(err) => {
                warn!(
                    correlation_id = %response.reply_to,
                    channel = %response_channel,
                    error = %err,
                    "Failed to publish response"
                );
                DispatchOutcome::ReplyFailed
            }
        }
    }
}

impl fmt::Debug for HandlerDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDispatcher")
            .field("registry", &self.registry)
            .field("naming", &self.naming)
            .finish()
    }
}

/// Receive requests for one channel and handle each on its own task.
#[instrument(skip_all, fields(channel = %channel))]
async fn request_pump(
    dispatcher: Arc<HandlerDispatcher>,
    channel: LogicalChannel,
    mut subscription: Subscription,
) {
    while let Some(message) = subscription.recv().await {
        let dispatcher = Arc::clone(&dispatcher);
        let channel = channel.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(&channel, &message).await;
        });
    }
    info!("Request subscription closed");
}

/// Running dispatcher. Dropping it stops every pump.
#[derive(Debug)]
pub struct DispatcherHandle {
    pumps: Vec<AbortOnDrop>,
}

impl DispatcherHandle {
    /// Number of channels being served.
    pub fn channel_count(&self) -> usize {
        self.pumps.len()
    }

    /// Whether any pump is still receiving.
    pub fn is_running(&self) -> bool {
        self.pumps.iter().any(|pump| !pump.is_finished())
    }

    /// Stop receiving requests. In-flight requests still get their reply.
    pub fn shutdown(self) {
        info!(channels = self.pumps.len(), "Handler dispatcher stopped");
        drop(self);
    }
}
