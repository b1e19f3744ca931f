//! Batch processing and partial-batch-failure reporting
//!
//! Records are dispatched one at a time and independently. The report lists
//! only the messages the queue must redeliver; everything else in the batch
//! is acknowledged.

use crate::config::TerminalFailurePolicy;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::envelope::QueueRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

const DEFAULT_DEADLINE_MARGIN: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// Per-outcome counters for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub delivered: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub dropped: usize,
    /// Not attempted because the invocation deadline was too close
    pub deferred: usize,
}

/// Wire shape: `{"batchItemFailures":[{"itemIdentifier":"..."}]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_item_failures: Vec<BatchItemFailure>,
    #[serde(skip)]
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn failed_ids(&self) -> Vec<&str> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect()
    }

    fn redeliver(&mut self, message_id: &str) {
        if !self.batch_item_failures.iter().any(|f| f.item_identifier == message_id) {
            self.batch_item_failures.push(BatchItemFailure {
                item_identifier: message_id.to_string(),
            });
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchProcessor {
    dispatcher: Dispatcher,
    terminal_policy: TerminalFailurePolicy,
    deadline_margin: Duration,
}

impl BatchProcessor {
    pub fn new(dispatcher: Dispatcher, terminal_policy: TerminalFailurePolicy) -> Self {
        Self {
            dispatcher,
            terminal_policy,
            deadline_margin: DEFAULT_DEADLINE_MARGIN,
        }
    }

    /// Records starting with less than `margin` left before the deadline are deferred
    pub fn with_deadline_margin(mut self, margin: Duration) -> Self {
        self.deadline_margin = margin;
        self
    }

    #[instrument(name = "batch", skip_all, fields(records = records.len()))]
    pub async fn process(&self, records: &[QueueRecord], deadline: Option<Instant>) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, record) in records.iter().enumerate() {
            if let Some(deadline) = deadline
                && deadline.saturating_duration_since(Instant::now()) < self.deadline_margin
            {
                let remaining = &records[index..];
                tracing::warn!(
                    remaining = remaining.len(),
                    "Invocation deadline approaching, deferring remaining records"
                );
                for record in remaining {
                    report.redeliver(record.message_id.as_deref().unwrap_or_default());
                    report.stats.deferred += 1;
                }
                break;
            }

            let Some(message_id) = record.message_id.as_deref().filter(|id| !id.is_empty())
            else {
                // An empty identifier makes the queue redeliver the whole batch;
                // records already delivered come back as duplicates.
                tracing::error!(index, "Queue record has no message id");
                report.redeliver("");
                report.stats.failed += 1;
                continue;
            };

            match self.dispatcher.dispatch(message_id, record.body.as_deref()).await {
                Ok(DispatchOutcome::Delivered) => report.stats.delivered += 1,
                Ok(DispatchOutcome::Duplicate) => report.stats.duplicates += 1,
                Err(err) if err.is_terminal() => match self.terminal_policy {
                    TerminalFailurePolicy::Drop => {
                        tracing::warn!(message_id, error = %err, "Dropping message that cannot be delivered");
                        report.stats.dropped += 1;
                    }
                    TerminalFailurePolicy::Retry => {
                        tracing::warn!(message_id, error = %err, "Message cannot be delivered, leaving it to the redrive policy");
                        report.redeliver(message_id);
                        report.stats.failed += 1;
                    }
                },
                Err(err) => {
                    tracing::error!(message_id, error = %err, "Failed to process message");
                    report.redeliver(message_id);
                    report.stats.failed += 1;
                }
            }
        }

        tracing::info!(
            delivered = report.stats.delivered,
            duplicates = report.stats.duplicates,
            failed = report.stats.failed,
            dropped = report.stats.dropped,
            deferred = report.stats.deferred,
            "Batch processed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests::{FlakyLedger, OPS_BODY, RecordingSender, dispatcher};
    use std::sync::Arc;

    fn processor(
        policy: TerminalFailurePolicy,
    ) -> (BatchProcessor, Arc<FlakyLedger>, Arc<RecordingSender>) {
        let ledger = Arc::new(FlakyLedger::default());
        let sender = Arc::new(RecordingSender::default());
        let processor = BatchProcessor::new(dispatcher(ledger.clone(), sender.clone()), policy);
        (processor, ledger, sender)
    }

    const UNKNOWN_KEY_BODY: &str = r#"{"webhook_key":"sales","payload":"hi"}"#;

    #[test]
    fn report_serializes_to_queue_protocol() {
        let mut report = BatchReport::default();
        report.redeliver("m1");
        report.redeliver("m1");
        report.stats.failed = 2;
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"batchItemFailures":[{"itemIdentifier":"m1"}]}"#
        );
        assert_eq!(
            serde_json::to_string(&BatchReport::default()).unwrap(),
            r#"{"batchItemFailures":[]}"#
        );
    }

    #[tokio::test]
    async fn terminal_failures_are_reported_under_retry_policy() {
        let (processor, _, sender) = processor(TerminalFailurePolicy::Retry);
        let records = [
            QueueRecord::new("m1", OPS_BODY),
            QueueRecord::new("m2", UNKNOWN_KEY_BODY),
            QueueRecord::new("m3", "garbage"),
        ];

        let report = processor.process(&records, None).await;

        assert_eq!(report.failed_ids(), vec!["m2", "m3"]);
        assert_eq!(report.stats.delivered, 1);
        assert_eq!(report.stats.failed, 2);
        assert_eq!(sender.calls(), 1);
    }

    #[tokio::test]
    async fn terminal_failures_are_acknowledged_under_drop_policy() {
        let (processor, ledger, _) = processor(TerminalFailurePolicy::Drop);
        let records = [
            QueueRecord::new("m1", UNKNOWN_KEY_BODY),
            QueueRecord::new("m2", "garbage"),
        ];

        let report = processor.process(&records, None).await;

        assert!(report.batch_item_failures.is_empty());
        assert_eq!(report.stats.dropped, 2);
        // Rolled back all the same
        assert!(ledger.inner.is_empty());
    }

    #[tokio::test]
    async fn retriable_failures_are_reported_under_drop_policy() {
        let (processor, ledger, _) = processor(TerminalFailurePolicy::Drop);
        ledger
            .fail_acquire
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let report = processor
            .process(&[QueueRecord::new("m1", OPS_BODY)], None)
            .await;

        assert_eq!(report.failed_ids(), vec!["m1"]);
    }

    #[tokio::test]
    async fn missing_message_id_is_reported_as_empty_identifier() {
        let (processor, _, sender) = processor(TerminalFailurePolicy::Retry);
        let records = [
            QueueRecord {
                message_id: None,
                body: Some(OPS_BODY.to_string()),
            },
            QueueRecord::new("m2", OPS_BODY),
        ];

        let report = processor.process(&records, None).await;

        assert_eq!(report.failed_ids(), vec![""]);
        assert_eq!(report.stats.delivered, 1);
        assert_eq!(sender.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn records_past_the_deadline_margin_are_deferred() {
        let (processor, ledger, sender) = processor(TerminalFailurePolicy::Retry);
        let processor = processor.with_deadline_margin(Duration::from_secs(1));
        let records = [
            QueueRecord::new("m1", OPS_BODY),
            QueueRecord::new("m2", OPS_BODY),
        ];

        let deadline = Instant::now() + Duration::from_millis(500);
        let report = processor.process(&records, Some(deadline)).await;

        assert_eq!(report.failed_ids(), vec!["m1", "m2"]);
        assert_eq!(report.stats.deferred, 2);
        assert_eq!(sender.calls(), 0);
        assert!(ledger.inner.is_empty());

        let deadline = Instant::now() + Duration::from_secs(30);
        let report = processor.process(&records, Some(deadline)).await;
        assert!(report.batch_item_failures.is_empty());
        assert_eq!(report.stats.delivered, 2);
    }
}
