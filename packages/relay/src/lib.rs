//! Webhook Relay
//!
//! Forwards messages from an at-least-once queue to chat webhooks, calling
//! each webhook at most once per message id within the ledger's retention
//! window.
//!
//! ## Pipeline
//!
//! ```text
//! queue batch -> BatchProcessor -> Dispatcher (per record)
//!                                    |- IdempotencyLedger  acquire / complete / release
//!                                    |- DirectoryCache     webhook key -> URL
//!                                    '- WebhookSender      POST with retry/backoff
//!             <- BatchReport { batchItemFailures }
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use webhook_relay::*;
//!
//! let config = RelayConfig::from_env()?;
//! let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
//! let directory = DirectoryCache::new(
//!     Arc::new(SecretsManagerSource::new(&aws_config, &config.secret_id)),
//!     config.cache_ttl(),
//!     config.stale_policy,
//! );
//! let dispatcher = Dispatcher::new(
//!     Arc::new(DynamoDbLedger::new(&aws_config, &config.ledger_table, config.ledger_ttl)),
//!     Arc::new(directory),
//!     Arc::new(DeliveryClient::new(config.delivery.clone())),
//! );
//! let processor = BatchProcessor::new(dispatcher, config.terminal_failure_policy);
//! let report = processor.process(&records, None).await;
//! ```

pub mod batch;
pub mod config;
pub mod delivery;
pub mod directory;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod publish;

#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use batch::{BatchItemFailure, BatchProcessor, BatchReport, BatchStats};
pub use config::{
    DeliveryConfig, LedgerTtl, PublisherConfig, RelayConfig, StalePolicy, TerminalFailurePolicy,
};
pub use delivery::{DeliveryClient, WebhookSender, webhook_body};
pub use directory::{DirectoryCache, SecretSource, StaticSecretSource};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use envelope::{Envelope, QueueRecord};
pub use error::{
    ConfigError, DeliveryError, DirectoryError, DispatchError, LedgerError, PublishError,
};
pub use ledger::{Acquisition, IdempotencyLedger, InMemoryLedger, LedgerEntry, LedgerStatus};
pub use publish::{QueuePublisher, parse_publish_request};

#[cfg(feature = "secretsmanager")]
pub use directory::SecretsManagerSource;

#[cfg(feature = "dynamodb")]
pub use ledger::DynamoDbLedger;

#[cfg(feature = "sqs")]
pub use publish::SqsPublisher;
