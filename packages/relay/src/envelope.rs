//! Queue record and message envelope types

use crate::error::DispatchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message of an inbound queue batch. Both fields mirror the queue's
/// wire format, where either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub message_id: Option<String>,
    pub body: Option<String>,
}

impl QueueRecord {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            body: Some(body.into()),
        }
    }
}

/// Decoded message body: which webhook to call and what to send.
///
/// `key` and `text` are accepted as aliases for producers using the older
/// field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(alias = "key")]
    pub webhook_key: String,
    #[serde(alias = "text", default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(webhook_key: impl Into<String>, payload: Value) -> Self {
        Self {
            webhook_key: webhook_key.into(),
            payload,
        }
    }

    pub fn decode(body: &str) -> Result<Self, DispatchError> {
        let envelope: Envelope = serde_json::from_str(body)
            .map_err(|e| DispatchError::Malformed(format!("invalid message body: {e}")))?;

        if envelope.webhook_key.trim().is_empty() {
            return Err(DispatchError::Malformed("webhook key is empty".into()));
        }
        if envelope.payload.is_null() {
            return Err(DispatchError::Malformed("payload is missing".into()));
        }

        Ok(envelope)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
