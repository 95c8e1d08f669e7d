//! # Shared Bus - Publish/Subscribe Transport
//!
//! The fire-and-forget broadcast layer that request/reply messaging is built
//! on top of.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Publisher   │                    │  Subscriber  │
//! │              │  publish(channel)  │  (pattern)   │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │     Bus      │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe(pattern)
//! ```
//!
//! - Payloads are opaque bytes.
//! - Subscriptions are literal channel names or Redis-style globs.
//! - No ordering guarantee across channels.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod message;
pub mod pattern;
pub mod publisher;
pub mod subscriber;
pub mod transport;

// Re-export main types
pub use message::BusMessage;
pub use pattern::{glob_match, ChannelPattern};
pub use publisher::InMemoryBus;
pub use subscriber::{Subscription, SubscriptionError};
pub use transport::{PubSubTransport, TransportError};

/// Maximum messages to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
