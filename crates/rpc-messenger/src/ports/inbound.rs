//! Inbound port: handlers the dispatcher invokes for requests.
//!
//! The dispatcher only sees untyped JSON. [`Typed`] adapts a handler written
//! against concrete request/response types; [`handler_fn`] adapts a closure.

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Handles requests arriving on one logical channel.
///
/// A returned error becomes a failure response whose message is the error's
/// full context chain.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: Option<Value>) -> anyhow::Result<Option<Value>>;
}

/// Produces the handler for one request.
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn MessageHandler> + Send + Sync>;

/// Handler over concrete request/response shapes.
#[async_trait]
pub trait TypedHandler: Send + Sync {
    type Request: DeserializeOwned + Send;
    type Response: Serialize + Send;

    /// `request` is `None` when the caller sent no payload.
    async fn handle(&self, request: Option<Self::Request>) -> anyhow::Result<Self::Response>;
}

/// Adapts a [`TypedHandler`] to the untyped [`MessageHandler`] interface.
#[derive(Debug, Clone, Default)]
pub struct Typed<H>(pub H);

#[async_trait]
impl<H: TypedHandler> MessageHandler for Typed<H> {
    async fn handle(&self, payload: Option<Value>) -> anyhow::Result<Option<Value>> {
        let request = payload
            .map(serde_json::from_value::<H::Request>)
            .transpose()
            .context("invalid request payload")?;

        let response = self.0.handle(request).await?;
        let value = serde_json::to_value(response).context("invalid response payload")?;
        Ok(Some(value))
    }
}

/// Closure-backed handler, see [`handler_fn`].
pub struct FnHandler<F>(F);

/// Build a handler from an async closure.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<Value>>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<Value>>> + Send,
{
    async fn handle(&self, payload: Option<Value>) -> anyhow::Result<Option<Value>> {
        (self.0)(payload).await
    }
}
