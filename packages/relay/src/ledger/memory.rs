//! In-process ledger with the same semantics as the DynamoDB backend.
//! Only safe across tasks of one process.

use super::types::*;
use crate::error::LedgerError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: Mutex<HashMap<String, LedgerEntry>>,
    ttl: LedgerTtl,
}

impl InMemoryLedger {
    pub fn new(ttl: LedgerTtl) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn entry(&self, message_id: &str) -> Option<LedgerEntry> {
        self.entries.lock().get(message_id).cloned()
    }

    /// Put an entry as-is, bypassing the conditional insert
    pub fn insert(&self, entry: LedgerEntry) {
        self.entries.lock().insert(entry.message_id.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdempotencyLedger for InMemoryLedger {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn acquire(&self, message_id: &str) -> Result<Acquisition, LedgerError> {
        let now = chrono::Utc::now().timestamp();
        let mut entries = self.entries.lock();

        if let Some(existing) = entries.get(message_id)
            && existing.is_live(now)
        {
            return Ok(Acquisition::AlreadyInProgress);
        }

        entries.insert(
            message_id.to_string(),
            LedgerEntry {
                message_id: message_id.to_string(),
                status: LedgerStatus::InProgress,
                created_at: now,
                ttl: now.saturating_add(self.ttl.in_progress_secs),
                completed_at: None,
            },
        );
        Ok(Acquisition::Acquired)
    }

    async fn complete(&self, message_id: &str) -> Result<(), LedgerError> {
        let now = chrono::Utc::now().timestamp();
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(message_id.to_string())
            .or_insert_with(|| LedgerEntry {
                message_id: message_id.to_string(),
                status: LedgerStatus::InProgress,
                created_at: now,
                ttl: now,
                completed_at: None,
            });
        entry.status = LedgerStatus::Completed;
        entry.ttl = now.saturating_add(self.ttl.completed_secs);
        entry.completed_at = Some(now);
        Ok(())
    }

    async fn release(&self, message_id: &str) -> Result<(), LedgerError> {
        let mut entries = self.entries.lock();
        if entries
            .get(message_id)
            .is_some_and(|e| e.status == LedgerStatus::InProgress)
        {
            entries.remove(message_id);
        }
        Ok(())
    }
}
