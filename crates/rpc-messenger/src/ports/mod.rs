//! Ports (hexagonal architecture).
//!
//! Inbound: handlers invoked by the dispatcher.
//! Outbound: the pub/sub transport, defined in `shared-bus` and re-exported.

pub mod inbound;

pub use inbound::{handler_fn, FnHandler, HandlerFactory, MessageHandler, Typed, TypedHandler};
pub use shared_bus::{PubSubTransport, Subscription, TransportError};
