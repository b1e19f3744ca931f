//! Per-message dispatch state machine
//!
//! ```text
//! NEW --acquire: Acquired--> LOCKED --decode, resolve, deliver, complete--> DELIVERED
//!                              |
//!                              +--any failure--> release --> ROLLED_BACK (error returned)
//! NEW --acquire: AlreadyInProgress--> DUPLICATE
//! ```
//!
//! The lock is taken before any side effect. If the process dies mid-delivery
//! the `IN_PROGRESS` entry keeps guarding the message until its ttl expires.

use crate::delivery::WebhookSender;
use crate::directory::DirectoryCache;
use crate::envelope::Envelope;
use crate::error::DispatchError;
use crate::ledger::{Acquisition, IdempotencyLedger};
use std::sync::Arc;
use tracing::{Span, instrument};

/// Terminal success states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Another invocation owns or already delivered this message
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    ledger: Arc<dyn IdempotencyLedger>,
    directory: Arc<DirectoryCache>,
    sender: Arc<dyn WebhookSender>,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<dyn IdempotencyLedger>,
        directory: Arc<DirectoryCache>,
        sender: Arc<dyn WebhookSender>,
    ) -> Self {
        Self {
            ledger,
            directory,
            sender,
        }
    }

    #[instrument(name = "dispatch", skip(self, body), fields(webhook_key))]
    pub async fn dispatch(
        &self,
        message_id: &str,
        body: Option<&str>,
    ) -> Result<DispatchOutcome, DispatchError> {
        match self.ledger.acquire(message_id).await? {
            Acquisition::Acquired => {}
            Acquisition::AlreadyInProgress => {
                tracing::info!(
                    backend = self.ledger.backend_name(),
                    "Duplicate delivery skipped"
                );
                return Ok(DispatchOutcome::Duplicate);
            }
        }

        match self.deliver_locked(message_id, body).await {
            Ok(()) => Ok(DispatchOutcome::Delivered),
            Err(err) => {
                if let Err(release_err) = self.ledger.release(message_id).await {
                    tracing::error!(
                        error = %release_err,
                        original_error = %err,
                        "Failed to release ledger entry, it stays locked until its ttl expires"
                    );
                }
                Err(err)
            }
        }
    }

    async fn deliver_locked(&self, message_id: &str, body: Option<&str>) -> Result<(), DispatchError> {
        let body = body.ok_or_else(|| DispatchError::Malformed("record has no body".into()))?;
        let envelope = Envelope::decode(body)?;
        Span::current().record("webhook_key", envelope.webhook_key.as_str());

        let url = self.directory.resolve(&envelope.webhook_key).await?;
        self.sender.deliver(&url, &envelope.payload).await?;
        self.ledger.complete(message_id).await?;

        tracing::info!("Message delivered");
        Ok(())
    }
}
