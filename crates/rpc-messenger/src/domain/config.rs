//! Messenger configuration with validation.

use crate::domain::naming::{ChannelNaming, ClientId, NamingError};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default time a query waits for its response.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Main messenger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    /// Identity replies are routed to (default: random UUID)
    pub client_name: Option<String>,
    /// Prefix shared by every channel of this deployment
    pub channel_prefix: Option<String>,
    /// Timeout for queries that do not supply their own
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    /// Buffer size of the in-memory bus
    pub bus_capacity: usize,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            client_name: None,
            channel_prefix: None,
            default_timeout: DEFAULT_QUERY_TIMEOUT,
            bus_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl MessengerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MESSENGER_CLIENT_NAME`: client identity (default: random)
    /// - `MESSENGER_CHANNEL_PREFIX`: channel prefix (default: none)
    /// - `MESSENGER_DEFAULT_TIMEOUT_MS`: query timeout in ms (default: 5000)
    /// - `MESSENGER_BUS_CAPACITY`: in-memory bus buffer (default: 1000)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            client_name: lookup("MESSENGER_CLIENT_NAME").filter(|v| !v.is_empty()),
            channel_prefix: lookup("MESSENGER_CHANNEL_PREFIX").filter(|v| !v.is_empty()),
            default_timeout: lookup("MESSENGER_DEFAULT_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_timeout),
            bus_capacity: lookup("MESSENGER_BUS_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bus_capacity),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "default timeout cannot be 0".into(),
            ));
        }

        if self.bus_capacity == 0 {
            return Err(ConfigError::InvalidCapacity(
                "bus capacity cannot be 0".into(),
            ));
        }

        if let Some(name) = &self.client_name {
            ClientId::new(name.as_str())?;
        }
        ChannelNaming::new(self.channel_prefix.as_deref())?;

        Ok(())
    }

    /// The configured client identity, or a fresh random one.
    pub fn client_id(&self) -> Result<ClientId, ConfigError> {
        match &self.client_name {
            Some(name) => Ok(ClientId::new(name.as_str())?),
            None => Ok(ClientId::random()),
        }
    }

    /// Channel naming for the configured prefix.
    pub fn naming(&self) -> Result<ChannelNaming, ConfigError> {
        Ok(ChannelNaming::new(self.channel_prefix.as_deref())?)
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("Invalid name: {0}")]
    InvalidName(#[from] NamingError),
}
