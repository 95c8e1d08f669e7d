//! Channel naming scheme.
//!
//! Maps a logical channel and a client identity to the concrete transport
//! channels used for one conversation:
//!
//! ```text
//! request   {prefix}{channel}:req-{client}
//! response  {prefix}{channel}:res-{client}
//! listen    {prefix}{channel}:req-*          (dispatcher, every client)
//! ```
//!
//! Logical names may not contain `:`, so the first `:` after the prefix always
//! separates the name from the kind marker. Together with the distinct
//! `req-`/`res-` markers this makes the mapping collision-free for a fixed
//! prefix, and keeps the listen pattern off every response channel.

use serde::{Deserialize, Serialize};
use shared_bus::ChannelPattern;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Marker between a logical channel and the client of a request channel.
pub const REQUEST_MARKER: &str = ":req-";
/// Marker between a logical channel and the client of a response channel.
pub const RESPONSE_MARKER: &str = ":res-";
/// Appended to a non-empty configured prefix.
pub const PREFIX_SEPARATOR: char = '_';

/// Characters with meaning in transport glob patterns.
const GLOB_CHARS: [char; 5] = ['*', '?', '[', ']', '\\'];

/// Invalid channel or client names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} '{value}' contains reserved character '{ch}'")]
    ReservedChar {
        kind: &'static str,
        value: String,
        ch: char,
    },
}

fn check(kind: &'static str, value: &str, reserved: &[char]) -> Result<(), NamingError> {
    if let Some(ch) = value.chars().find(|c| reserved.contains(c)) {
        return Err(NamingError::ReservedChar {
            kind,
            value: value.to_string(),
            ch,
        });
    }
    Ok(())
}

/// Application-level topic name, independent of transport channel names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalChannel(String);

impl LogicalChannel {
    /// Validate a logical channel name.
    pub fn new(name: impl Into<String>) -> Result<Self, NamingError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NamingError::Empty {
                kind: "logical channel",
            });
        }
        check("logical channel", &name, &[':', '*', '?', '[', ']', '\\'])?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity a client's replies are routed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    /// Validate a client identity.
    pub fn new(id: impl Into<String>) -> Result<Self, NamingError> {
        let id = id.into();
        if id.is_empty() {
            return Err(NamingError::Empty { kind: "client id" });
        }
        check("client id", &id, &GLOB_CHARS)?;
        Ok(Self(id))
    }

    /// A fresh random identity (UUID v4).
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_newtype {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $ty {
            type Err = NamingError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = NamingError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = NamingError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$ty> for String {
            fn from(v: $ty) -> String {
                v.0
            }
        }
    };
}

string_newtype!(LogicalChannel);
string_newtype!(ClientId);

/// Channel name derivation for one configured prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelNaming {
    /// Rendered prefix including its separator, or empty.
    prefix: String,
}

impl ChannelNaming {
    /// Naming without a prefix.
    pub fn unprefixed() -> Self {
        Self::default()
    }

    /// Naming for a configured prefix. `Some("app")` renders as `app_`;
    /// `None` or an empty prefix renders as nothing.
    pub fn new(prefix: Option<&str>) -> Result<Self, NamingError> {
        match prefix {
            None | Some("") => Ok(Self::unprefixed()),
            Some(p) => {
                check("channel prefix", p, &GLOB_CHARS)?;
                Ok(Self {
                    prefix: format!("{p}{PREFIX_SEPARATOR}"),
                })
            }
        }
    }

    /// The rendered prefix (with separator).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Concrete channel a client publishes requests to.
    pub fn request_channel(&self, channel: &LogicalChannel, client: &ClientId) -> String {
        format!("{}{}{}{}", self.prefix, channel, REQUEST_MARKER, client)
    }

    /// Concrete channel a client receives responses on.
    pub fn response_channel(&self, channel: &LogicalChannel, client: &ClientId) -> String {
        format!("{}{}{}{}", self.prefix, channel, RESPONSE_MARKER, client)
    }

    /// Glob covering the request channels of every client.
    pub fn request_pattern(&self, channel: &LogicalChannel) -> ChannelPattern {
        ChannelPattern::glob(format!("{}{}{}*", self.prefix, channel, REQUEST_MARKER))
    }
}

/// One client's view of one logical channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelIdentity {
    pub naming: ChannelNaming,
    pub channel: LogicalChannel,
    pub client_id: ClientId,
}

impl ChannelIdentity {
    pub fn new(naming: ChannelNaming, channel: LogicalChannel, client_id: ClientId) -> Self {
        Self {
            naming,
            channel,
            client_id,
        }
    }

    pub fn request_channel(&self) -> String {
        self.naming.request_channel(&self.channel, &self.client_id)
    }

    pub fn response_channel(&self) -> String {
        self.naming.response_channel(&self.channel, &self.client_id)
    }
}
