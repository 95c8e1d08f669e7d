//! Request and response envelopes.
//!
//! Wire format (JSON, camelCase):
//!
//! ```text
//! request   {"requestId": "...", "clientId": "...", "payload": <any>}
//! response  {"replyTo": "...", "success": true|false,
//!            "errorMessage": "..."|null, "payload": <any>|null}
//! ```
//!
//! Payloads stay untyped `serde_json::Value`s here; only the handler and the
//! calling channel know their concrete shape. A JSON `null` payload and an
//! absent payload are the same thing.

use crate::domain::correlation::CorrelationId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why an inbound payload could not be turned into an envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,

    #[error("payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("envelope root must be a JSON object")]
    NotAnObject,

    #[error("envelope is missing required fields: {0}")]
    Shape(#[source] serde_json::Error),

    #[error("envelope field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("inconsistent response envelope: {0}")]
    Inconsistent(&'static str),
}

/// Envelopes could not be serialized.
#[derive(Debug, Error)]
#[error("failed to encode envelope: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

fn parse_object(bytes: &[u8]) -> Result<Value, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let root: Value = serde_json::from_slice(bytes).map_err(DecodeError::Json)?;
    if !root.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    Ok(root)
}

fn non_null(payload: Option<Value>) -> Option<Value> {
    payload.filter(|v| !v.is_null())
}

/// A call published by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Correlation id the reply must carry in `replyTo`.
    pub request_id: CorrelationId,
    /// Where the reply is routed. `clientName` is accepted from older peers.
    #[serde(alias = "clientName")]
    pub client_id: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl RequestEnvelope {
    /// Build a request with a fresh correlation id.
    pub fn new(client_id: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            request_id: CorrelationId::new(),
            client_id: client_id.into(),
            payload: non_null(payload),
        }
    }

    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let root = parse_object(bytes)?;
        let mut req: Self = serde_json::from_value(root).map_err(DecodeError::Shape)?;

        if req.request_id.is_empty() {
            return Err(DecodeError::EmptyField("requestId"));
        }
        if req.client_id.is_empty() {
            return Err(DecodeError::EmptyField("clientId"));
        }
        req.payload = non_null(req.payload.take());
        Ok(req)
    }
}

/// The single reply to a request.
///
/// Construct through [`ResponseEnvelope::ok`] or [`ResponseEnvelope::failure`]
/// so the success/error invariant always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub reply_to: CorrelationId,
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl ResponseEnvelope {
    /// Successful reply carrying the handler's result.
    pub fn ok(reply_to: CorrelationId, payload: Option<Value>) -> Self {
        Self {
            reply_to,
            success: true,
            error_message: None,
            payload: non_null(payload),
        }
    }

    /// Failed reply carrying the handler's error description.
    pub fn failure(reply_to: CorrelationId, message: impl Into<String>) -> Self {
        Self {
            reply_to,
            success: false,
            error_message: Some(message.into()),
            payload: None,
        }
    }

    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let root = parse_object(bytes)?;
        let mut res: Self = serde_json::from_value(root).map_err(DecodeError::Shape)?;

        if res.reply_to.is_empty() {
            return Err(DecodeError::EmptyField("replyTo"));
        }
        res.payload = non_null(res.payload.take());

        if res.success {
            if res.error_message.is_some() {
                return Err(DecodeError::Inconsistent("success with an error message"));
            }
        } else {
            if res.error_message.is_none() {
                return Err(DecodeError::Inconsistent("failure without an error message"));
            }
            if res.payload.is_some() {
                return Err(DecodeError::Inconsistent("failure with a payload"));
            }
        }
        Ok(res)
    }
}
