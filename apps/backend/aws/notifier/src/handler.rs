use aws_lambda_events::sqs::{BatchItemFailure, SqsBatchResponse, SqsEvent};
use lambda_runtime::{Error, LambdaEvent};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use webhook_relay::{BatchProcessor, BatchReport, QueueRecord};

pub async fn handle(
    processor: &BatchProcessor,
    event: LambdaEvent<SqsEvent>,
) -> Result<SqsBatchResponse, Error> {
    let records = queue_records(&event.payload);
    let deadline = deadline_from_epoch_ms(event.context.deadline);

    let report = processor.process(&records, deadline).await;
    Ok(batch_response(report))
}

fn queue_records(event: &SqsEvent) -> Vec<QueueRecord> {
    event
        .records
        .iter()
        .map(|record| QueueRecord {
            message_id: record.message_id.clone(),
            body: record.body.clone(),
        })
        .collect()
}

/// Lambda reports the deadline as epoch milliseconds; 0 means unknown
fn deadline_from_epoch_ms(deadline_ms: u64) -> Option<Instant> {
    if deadline_ms == 0 {
        return None;
    }
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    Some(Instant::now() + Duration::from_millis(deadline_ms.saturating_sub(now_ms)))
}

fn batch_response(report: BatchReport) -> SqsBatchResponse {
    SqsBatchResponse {
        batch_item_failures: report
            .batch_item_failures
            .into_iter()
            .map(|failure| BatchItemFailure {
                item_identifier: failure.item_identifier,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_runtime::Context;
    use serde_json::json;
    use std::sync::Arc;
    use webhook_relay::{
        DeliveryClient, DeliveryConfig, DirectoryCache, Dispatcher, IdempotencyLedger,
        InMemoryLedger, StalePolicy, StaticSecretSource, TerminalFailurePolicy,
    };

    fn processor(ledger: Arc<InMemoryLedger>) -> BatchProcessor {
        let directory = DirectoryCache::new(
            Arc::new(StaticSecretSource::new(r#"{"ops":"http://127.0.0.1:9/hook"}"#)),
            Duration::from_secs(60),
            StalePolicy::ServeStale,
        );
        let dispatcher = Dispatcher::new(
            ledger,
            Arc::new(directory),
            Arc::new(DeliveryClient::new(DeliveryConfig::default())),
        );
        BatchProcessor::new(dispatcher, TerminalFailurePolicy::Retry)
    }

    fn sqs_event(records: serde_json::Value) -> SqsEvent {
        serde_json::from_value(json!({ "Records": records })).unwrap()
    }

    #[test]
    fn records_keep_id_and_body() {
        let event = sqs_event(json!([
            { "messageId": "m1", "body": "{}" },
            { "messageId": "m2" },
        ]));

        let records = queue_records(&event);

        assert_eq!(records[0], QueueRecord::new("m1", "{}"));
        assert_eq!(records[1].message_id.as_deref(), Some("m2"));
        assert_eq!(records[1].body, None);
    }

    #[test]
    fn deadline_is_relative_to_now() {
        assert!(deadline_from_epoch_ms(0).is_none());

        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let deadline = deadline_from_epoch_ms(now_ms + 30_000).unwrap();
        let remaining = deadline.saturating_duration_since(Instant::now());
        assert!(remaining > Duration::from_secs(25));
        assert!(remaining <= Duration::from_secs(30));

        let past = deadline_from_epoch_ms(now_ms - 5_000).unwrap();
        assert!(past <= Instant::now());
    }

    #[tokio::test]
    async fn failed_records_become_batch_item_failures() {
        let ledger = Arc::new(InMemoryLedger::default());
        // m1 is held by another invocation, m2 names an unknown webhook
        ledger.acquire("m1").await.unwrap();
        let event = sqs_event(json!([
            { "messageId": "m1", "body": r#"{"webhook_key":"ops","payload":"hi"}"# },
            { "messageId": "m2", "body": r#"{"webhook_key":"sales","payload":"hi"}"# },
        ]));

        let response = handle(
            &processor(ledger),
            LambdaEvent::new(event, Context::default()),
        )
        .await
        .unwrap();

        let ids: Vec<_> = response
            .batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["m2"]);
    }

    #[tokio::test]
    async fn expired_deadline_defers_the_whole_batch() {
        let ledger = Arc::new(InMemoryLedger::default());
        let event = sqs_event(json!([
            { "messageId": "m1", "body": r#"{"webhook_key":"ops","payload":"hi"}"# },
        ]));
        let mut context = Context::default();
        context.deadline = 1;

        let response = handle(&processor(ledger.clone()), LambdaEvent::new(event, context))
            .await
            .unwrap();

        assert_eq!(response.batch_item_failures.len(), 1);
        assert!(ledger.is_empty());
    }
}
