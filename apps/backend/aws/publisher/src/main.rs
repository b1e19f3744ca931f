//! AWS Lambda Publisher
//!
//! HTTP entry point for notifications. Validates `{"key", "payload"}`
//! requests and enqueues them for the notifier.
//!
//! - `200 {"message":"queued","id":...}` once the queue accepted the message
//! - `400 {"message":...}` for invalid requests
//! - `500 {"message":"internal error"}` when the queue is unavailable

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use lambda_http::{Error, Request, run, service_fn, tracing};
use webhook_relay::{PublisherConfig, SqsPublisher, telemetry};

mod handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _sentry_guard = telemetry::init(sentry::release_name!(), &["aws_publisher"]);

    let config = PublisherConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let publisher = SqsPublisher::new(&aws_config, &config.queue_url);

    tracing::info!(queue_url = %config.queue_url, "Starting notification publisher");

    let publisher = &publisher;
    run(service_fn(move |request: Request| async move {
        handler::handle(publisher, request).await
    }))
    .await
}
