//! RPC Messenger - request/reply messaging over publish/subscribe.
//!
//! A pub/sub transport only offers fire-and-forget broadcast. This crate
//! layers calls with replies on top of it: a client publishes a request and
//! awaits the matching response, a dispatcher routes requests to registered
//! handlers and always answers exactly once.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐                 ┌──────────────────────────┐
//! │  MessageChannel (client) │                 │  HandlerDispatcher       │
//! │                          │  {ch}:req-{id}  │                          │
//! │  query ── register ──────┼────────────────▶│  {ch}:req-* ─▶ handler   │
//! │    ▲      pending call   │                 │                  │       │
//! │    │                     │  {ch}:res-{id}  │                  ▼       │
//! │  pump ◀── complete ◀─────┼─────────────────┼── publish response       │
//! └──────────────────────────┘                 └──────────────────────────┘
//!                     ▲                                 ▲
//!                     └──────── PubSubTransport ────────┘
//!                               (shared-bus)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rpc_messenger::{HandlerRegistry, Messenger, MessengerConfig, Typed};
//!
//! let (messenger, _bus) = Messenger::in_memory(MessengerConfig::from_env())?;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_handler::<Typed<EchoHandler>>("echo")?;
//! let server = messenger.serve(registry).await?;
//!
//! let echo = messenger.channel::<EchoRequest, EchoResponse>("echo")?;
//! let reply = echo.query(EchoRequest { message: "ping".into() }).await?;
//! server.shutdown();
//! ```
//!
//! # Guarantees
//!
//! - Every pending call is resolved at most once and always leaves the
//!   pending table (response, timeout, cancel, the caller going away, or the
//!   response subscription closing)
//! - Every decodable request with a handler and a valid client id gets
//!   exactly one response, even if the handler fails or panics
//! - Channel names never collide across (channel, client) pairs

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod channel;
pub mod dispatcher;
pub mod domain;
pub mod messenger;
pub mod ports;
pub mod registry;

mod task;

// Re-exports for public API
pub use channel::{MessageChannel, QueryOptions};
pub use dispatcher::{DispatchOutcome, DispatcherHandle, DropReason, HandlerDispatcher};
pub use domain::config::{ConfigError, MessengerConfig, DEFAULT_QUERY_TIMEOUT};
pub use domain::error::MessengerError;
pub use domain::{
    ChannelIdentity, ChannelNaming, ClientId, CorrelationId, DecodeError, LogicalChannel,
    NamingError, RequestEnvelope, ResponseEnvelope,
};
pub use messenger::Messenger;
pub use ports::{handler_fn, HandlerFactory, MessageHandler, Typed, TypedHandler};
pub use registry::HandlerRegistry;
pub use tokio_util::sync::CancellationToken;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
