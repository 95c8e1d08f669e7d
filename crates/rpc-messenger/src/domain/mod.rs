//! Domain types for the messenger.
//!
//! Identities, channel naming, wire envelopes, configuration, and errors.
//! The pending call table lives here too; it only depends on tokio's oneshot.

pub mod config;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod naming;
pub mod pending;

// Re-exports for convenience
pub use config::{ConfigError, MessengerConfig, DEFAULT_QUERY_TIMEOUT};
pub use correlation::CorrelationId;
pub use envelope::{DecodeError, EncodeError, RequestEnvelope, ResponseEnvelope};
pub use error::MessengerError;
pub use naming::{ChannelIdentity, ChannelNaming, ClientId, LogicalChannel, NamingError};
pub use pending::{Abandon, PendingCallTable, PendingStats};
