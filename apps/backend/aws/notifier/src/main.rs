//! AWS Lambda Notifier
//!
//! Consumes SQS batches, relays each message to the chat webhook named by its
//! `webhook_key`, and reports partial batch failures so only failed messages
//! are redelivered. Needs `ReportBatchItemFailures` on the event source mapping.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use lambda_runtime::{Error, LambdaEvent, run, service_fn, tracing};
use std::sync::Arc;
use webhook_relay::{
    BatchProcessor, DeliveryClient, DirectoryCache, Dispatcher, DynamoDbLedger, RelayConfig,
    SecretsManagerSource, telemetry,
};

mod handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _sentry_guard = telemetry::init(sentry::release_name!(), &["aws_notifier"]);

    let config = RelayConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let directory = DirectoryCache::new(
        Arc::new(SecretsManagerSource::new(&aws_config, &config.secret_id)),
        config.cache_ttl(),
        config.stale_policy,
    );
    let ledger = DynamoDbLedger::new(&aws_config, &config.ledger_table, config.ledger_ttl);
    if config.ensure_ledger_table {
        ledger.ensure_table().await?;
    }
    let dispatcher = Dispatcher::new(
        Arc::new(ledger),
        Arc::new(directory),
        Arc::new(DeliveryClient::new(config.delivery.clone())),
    );
    let processor = BatchProcessor::new(dispatcher, config.terminal_failure_policy)
        .with_deadline_margin(config.deadline_margin());

    tracing::info!(
        ledger_table = %config.ledger_table,
        stale_policy = ?config.stale_policy,
        terminal_failure_policy = ?config.terminal_failure_policy,
        "Starting webhook notifier"
    );

    let processor = &processor;
    run(service_fn(move |event: LambdaEvent<_>| async move {
        handler::handle(processor, event).await
    }))
    .await
}
