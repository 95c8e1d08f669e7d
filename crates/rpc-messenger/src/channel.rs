//! # Message Channel (client side)
//!
//! Turns fire-and-forget publishes into calls with replies.
//!
//! ```text
//! query(payload)
//!   │ 1. subscribe to {channel}:res-{client}   (lazy, shared, renewed if closed)
//!   │ 2. register pending call under a fresh correlation id
//!   │ 3. publish request to {channel}:req-{client}
//!   ▼
//! wait for first of:  response │ deadline │ cancel token
//!
//! response pump: recv ──spawn──▶ decode ──▶ pending.complete(replyTo)
//! ```
//!
//! Undecodable responses and responses for unknown correlation ids are
//! dropped by the pump; they may belong to calls that already timed out.
//!
//! When the transport ends the response subscription, the pump fails every
//! waiting call with `Disconnected` and the next query subscribes again.

use crate::domain::pending::PendingGuard;
use crate::domain::{
    Abandon, ChannelIdentity, ClientId, LogicalChannel, MessengerError, PendingCallTable,
    PendingStats, RequestEnvelope, ResponseEnvelope,
};
use crate::task::AbortOnDrop;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared_bus::{ChannelPattern, PubSubTransport, Subscription};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Per-call overrides for [`MessageChannel::query_with`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Deadline for this call (default: the channel's default timeout)
    pub timeout: Option<Duration>,
    /// Cancels the call when triggered
    pub cancel: Option<CancellationToken>,
}

impl QueryOptions {
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    pub fn cancel(token: CancellationToken) -> Self {
        Self {
            timeout: None,
            cancel: Some(token),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A response pump. `closed` is set before the pump drains the pending
/// table on exit; the task finishes after the drain.
struct ResponsePump {
    task: AbortOnDrop,
    closed: Arc<AtomicBool>,
}

impl ResponsePump {
    fn is_live(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.task.is_finished()
    }
}

struct ChannelInner {
    transport: Arc<dyn PubSubTransport>,
    identity: ChannelIdentity,
    request_channel: String,
    response_channel: String,
    default_timeout: Duration,
    pending: Arc<PendingCallTable>,
    /// Serializes subscribing so concurrent first queries share one pump.
    subscribing: tokio::sync::Mutex<()>,
    /// Response pump, started by the first query.
    pump: Mutex<Option<ResponsePump>>,
}

impl ChannelInner {
    /// Closed flag of the current pump, until its task has finished.
    ///
    /// A pump that is closing but still draining is not replaced yet, so a
    /// new pump's calls are never drained by the old one.
    fn current_pump(&self) -> Option<Arc<AtomicBool>> {
        self.pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|pump| !pump.task.is_finished())
            .map(|pump| Arc::clone(&pump.closed))
    }
}

/// Typed request/reply channel for one logical channel.
///
/// Cloning is cheap; clones share the subscription and the pending table.
pub struct MessageChannel<Req, Res> {
    inner: Arc<ChannelInner>,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> Clone for MessageChannel<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _types: PhantomData,
        }
    }
}

impl<Req, Res> fmt::Debug for MessageChannel<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageChannel")
            .field("request_channel", &self.inner.request_channel)
            .field("response_channel", &self.inner.response_channel)
            .field("pending", &self.inner.pending.pending_count())
            .finish()
    }
}

impl<Req, Res> MessageChannel<Req, Res>
where
    Req: Serialize,
    Res: DeserializeOwned,
{
    /// Create a channel. Nothing is subscribed until the first query.
    pub fn new(
        transport: Arc<dyn PubSubTransport>,
        identity: ChannelIdentity,
        default_timeout: Duration,
    ) -> Self {
        let request_channel = identity.request_channel();
        let response_channel = identity.response_channel();
        Self {
            inner: Arc::new(ChannelInner {
                transport,
                identity,
                request_channel,
                response_channel,
                default_timeout,
                pending: Arc::new(PendingCallTable::new()),
                subscribing: tokio::sync::Mutex::new(()),
                pump: Mutex::new(None),
            }),
            _types: PhantomData,
        }
    }

    /// Publish a request without waiting for (or receiving) a reply.
    pub async fn send(&self, payload: Req) -> Result<(), MessengerError> {
        let request = self.request(payload)?;
        let bytes = request.encode()?;

        self.inner
            .transport
            .publish(&self.inner.request_channel, bytes)
            .await?;

        debug!(
            correlation_id = %request.request_id,
            channel = %self.inner.request_channel,
            "Sent request"
        );
        Ok(())
    }

    /// Call the handler and wait up to the default timeout for its reply.
    pub async fn query(&self, payload: Req) -> Result<Res, MessengerError> {
        self.query_with(payload, QueryOptions::default()).await
    }

    /// Call the handler and wait up to `timeout` for its reply.
    pub async fn query_timeout(&self, payload: Req, timeout: Duration) -> Result<Res, MessengerError> {
        self.query_with(payload, QueryOptions::timeout(timeout)).await
    }

    /// Call the handler with explicit deadline and cancellation.
    ///
    /// Exactly one outcome wins: the reply (`Ok`, or `RemoteHandler` if the
    /// handler failed), `Timeout`, or `Canceled`. If the deadline or the token
    /// fires after a reply already claimed the call, the reply is returned.
    pub async fn query_with(&self, payload: Req, options: QueryOptions) -> Result<Res, MessengerError> {
        let closed = self.ensure_subscribed().await?;

        let request = self.request(payload)?;
        let correlation_id = request.request_id.clone();
        let bytes = request.encode()?;
        let timeout = options.timeout.unwrap_or(self.inner.default_timeout);

        // Register before publishing so a fast reply always finds its call
        let mut rx = self.inner.pending.register(correlation_id.clone());
        let _guard = PendingGuard::new(Arc::clone(&self.inner.pending), correlation_id.clone());

        // The pump may have drained the table before this call was registered
        if closed.load(Ordering::SeqCst) {
            return Err(MessengerError::Disconnected);
        }

        self.inner
            .transport
            .publish(&self.inner.request_channel, bytes)
            .await?;

        debug!(
            correlation_id = %correlation_id,
            channel = %self.inner.request_channel,
            timeout_ms = timeout.as_millis(),
            "Published query"
        );

        let cancel = options.cancel;
        let canceled = async {
            match &cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            response = &mut rx => response.map_err(|_| MessengerError::Disconnected),
            () = canceled => Err(MessengerError::Canceled),
            () = tokio::time::sleep(timeout) => Err(MessengerError::Timeout(timeout)),
        };

        let response = match outcome {
            Err(err) if err.is_abandoned() => {
                let reason = match err {
                    MessengerError::Canceled => Abandon::Canceled,
                    _ => Abandon::Timeout,
                };
                if self.inner.pending.abandon(&correlation_id, reason) {
                    debug!(correlation_id = %correlation_id, reason = ?reason, "Query abandoned");
                    return Err(err);
                }
                // A reply claimed the call first and wins
                rx.await.map_err(|_| MessengerError::Disconnected)?
            }
            other => other?,
        };

        Self::into_result(response)
    }

    /// Logical channel this instance talks to.
    pub fn logical_channel(&self) -> &LogicalChannel {
        &self.inner.identity.channel
    }

    /// Identity replies are routed to.
    pub fn client_id(&self) -> &ClientId {
        &self.inner.identity.client_id
    }

    /// Concrete channel requests are published to.
    pub fn request_channel(&self) -> &str {
        &self.inner.request_channel
    }

    /// Concrete channel replies arrive on.
    pub fn response_channel(&self) -> &str {
        &self.inner.response_channel
    }

    /// Timeout used when a query supplies none.
    pub fn default_timeout(&self) -> Duration {
        self.inner.default_timeout
    }

    /// Number of queries waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.pending_count()
    }

    /// Pending table statistics.
    pub fn stats(&self) -> &PendingStats {
        self.inner.pending.stats()
    }

    /// Whether a response subscription is currently open.
    pub fn is_subscribed(&self) -> bool {
        self.inner
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(ResponsePump::is_live)
    }

    fn request(&self, payload: Req) -> Result<RequestEnvelope, MessengerError> {
        let value = serde_json::to_value(payload).map_err(MessengerError::RequestPayload)?;
        Ok(RequestEnvelope::new(
            self.inner.identity.client_id.as_str(),
            Some(value),
        ))
    }

    fn into_result(response: ResponseEnvelope) -> Result<Res, MessengerError> {
        if !response.success {
            return Err(MessengerError::RemoteHandler {
                message: response.error_message.unwrap_or_default(),
            });
        }
        serde_json::from_value(response.payload.unwrap_or(Value::Null))
            .map_err(MessengerError::ResponsePayload)
    }

    /// Make sure a response pump is running and return its closed flag.
    ///
    /// Concurrent first queries share one subscription. A pump whose
    /// subscription has ended is replaced once it has finished.
    async fn ensure_subscribed(&self) -> Result<Arc<AtomicBool>, MessengerError> {
        let inner = &self.inner;
        if let Some(closed) = inner.current_pump() {
            return Ok(closed);
        }

        let _subscribing = inner.subscribing.lock().await;
        if let Some(closed) = inner.current_pump() {
            return Ok(closed);
        }

        let subscription = inner
            .transport
            .subscribe(ChannelPattern::literal(inner.response_channel.as_str()))
            .await?;
        debug!(channel = %inner.response_channel, "Subscribed to responses");

        let closed = Arc::new(AtomicBool::new(false));
        let task = AbortOnDrop(tokio::spawn(response_pump(
            subscription,
            Arc::clone(&inner.pending),
            Arc::clone(&closed),
        )));
        *inner.pump.lock().unwrap_or_else(PoisonError::into_inner) = Some(ResponsePump {
            task,
            closed: Arc::clone(&closed),
        });
        Ok(closed)
    }
}

/// Receive responses and hand each to its own task.
#[instrument(skip_all, fields(channel = %subscription.pattern().as_str()))]
async fn response_pump(
    mut subscription: Subscription,
    pending: Arc<PendingCallTable>,
    closed: Arc<AtomicBool>,
) {
    while let Some(message) = subscription.recv().await {
        let pending = Arc::clone(&pending);
        tokio::spawn(async move {
            route_response(&pending, &message.payload);
        });
    }

    // No reply can arrive any more
    closed.store(true, Ordering::SeqCst);
    let dropped = pending.close_all();
    debug!(dropped, "Response subscription closed");
}

/// Decode one response and resolve its call. Returns whether a call matched.
pub(crate) fn route_response(pending: &PendingCallTable, payload: &[u8]) -> bool {
    match ResponseEnvelope::decode(payload) {
        Ok(response) => pending.complete(response),
        Err(err) => {
            debug!(error = %err, "Dropping undecodable response");
            false
        }
    }
}
