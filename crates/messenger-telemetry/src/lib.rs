//! # Messenger Telemetry
//!
//! Logging setup for processes that use `rpc-messenger`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use messenger_telemetry::{init_logging, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init_logging(&TelemetryConfig::from_env())?;
//!     // ...
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MESSENGER_SERVICE_NAME` | `rpc-messenger` | Service name in logs |
//! | `MESSENGER_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `MESSENGER_JSON_LOGS` | `false` | JSON output (default on in containers) |

mod config;
mod logging;

pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use logging::{env_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}
