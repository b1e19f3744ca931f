//! Error taxonomy for the relay pipeline
//!
//! Each component has its own error type; [`DispatchError`] wraps them at the
//! coordinator boundary and decides whether a failure is worth a redelivery.

/// Startup configuration errors. Any of these aborts process start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Webhook directory lookup errors
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The secret store could not be reached or returned an unusable secret
    #[error("Webhook directory unavailable: {0}")]
    Unavailable(String),
    #[error("Key '{0}' not found in webhook directory")]
    UnknownKey(String),
}

/// Outbound webhook call failed after exhausting its retry budget
#[derive(Debug, thiserror::Error)]
#[error("Webhook delivery failed after {attempts} attempt(s): {message}")]
pub struct DeliveryError {
    /// Last HTTP status received, if the endpoint answered at all
    pub status: Option<u16>,
    pub attempts: u32,
    pub message: String,
}

impl DeliveryError {
    pub fn status(status: u16, attempts: u32, body: impl AsRef<str>) -> Self {
        let body = body.as_ref();
        let message = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body}")
        };
        Self {
            status: Some(status),
            attempts,
            message,
        }
    }

    pub fn transport(attempts: u32, message: impl Into<String>) -> Self {
        Self {
            status: None,
            attempts,
            message: message.into(),
        }
    }
}

/// Idempotency ledger errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Store-level failure, always retriable
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
    #[error("Ledger serialization error: {0}")]
    Serialization(String),
}

/// Failure of a single message's dispatch, surfaced after rollback
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Malformed record: {0}")]
    Malformed(String),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl DispatchError {
    /// Terminal failures can never succeed on redelivery of the same message.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_) | Self::Directory(DirectoryError::UnknownKey(_))
        )
    }
}

/// Ingestion errors. Everything except [`PublishError::Queue`] is the caller's fault.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("request body is required")]
    MissingBody,
    #[error("body must be valid JSON")]
    InvalidJson,
    #[error("fields 'key' and 'payload' are required")]
    MissingFields,
    #[error("field 'payload' must be a JSON object/array or JSON string")]
    InvalidPayload,
    #[error("Queue error: {0}")]
    Queue(String),
}

impl PublishError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Queue(_))
    }
}
