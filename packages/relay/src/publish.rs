//! Ingestion: validate an inbound request and enqueue it

use crate::envelope::Envelope;
use crate::error::PublishError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

/// Validate a raw request body into an [`Envelope`].
///
/// The body must be a JSON object with a non-empty string `key` and a
/// `payload` that is either a JSON object/array or a string holding valid
/// JSON (which is parsed).
pub fn parse_publish_request(body: Option<&[u8]>) -> Result<Envelope, PublishError> {
    let body = body.ok_or(PublishError::MissingBody)?;
    let request: Value = serde_json::from_slice(body).map_err(|_| PublishError::InvalidJson)?;

    let key = request
        .get("key")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .ok_or(PublishError::MissingFields)?;
    let payload = request
        .get("payload")
        .filter(|p| !p.is_null())
        .ok_or(PublishError::MissingFields)?;

    Ok(Envelope::new(key, coerce_payload(payload)?))
}

fn coerce_payload(payload: &Value) -> Result<Value, PublishError> {
    match payload {
        Value::Object(_) | Value::Array(_) => Ok(payload.clone()),
        Value::String(raw) => serde_json::from_str(raw).map_err(|_| PublishError::InvalidPayload),
        _ => Err(PublishError::InvalidPayload),
    }
}

#[async_trait]
pub trait QueuePublisher: Send + Sync + Debug {
    /// Enqueue the envelope, returning the queue's message id
    async fn publish(&self, envelope: &Envelope) -> Result<String, PublishError>;
}

#[cfg(feature = "sqs")]
pub use sqs::SqsPublisher;

#[cfg(feature = "sqs")]
mod sqs {
    use super::*;
    use aws_config::SdkConfig;
    use aws_sdk_sqs::{Client, error::DisplayErrorContext};

    pub struct SqsPublisher {
        client: Client,
        queue_url: String,
    }

    impl Debug for SqsPublisher {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SqsPublisher")
                .field("queue_url", &self.queue_url)
                .finish()
        }
    }

    impl SqsPublisher {
        pub fn new(aws_config: &SdkConfig, queue_url: impl Into<String>) -> Self {
            Self {
                client: Client::new(aws_config),
                queue_url: queue_url.into(),
            }
        }
    }

    #[async_trait]
    impl QueuePublisher for SqsPublisher {
        async fn publish(&self, envelope: &Envelope) -> Result<String, PublishError> {
            let message_body = envelope
                .encode()
                .map_err(|e| PublishError::Queue(e.to_string()))?;

            let output = self
                .client
                .send_message()
                .queue_url(&self.queue_url)
                .message_body(message_body)
                .send()
                .await
                .map_err(|e| PublishError::Queue(DisplayErrorContext(&e).to_string()))?;

            Ok(output.message_id().unwrap_or_default().to_string())
        }
    }
}
