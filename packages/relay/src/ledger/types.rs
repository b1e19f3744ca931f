//! Types for the idempotency ledger abstraction

use crate::error::LedgerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub use crate::config::LedgerTtl;

/// Entry status (stored upper-case)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    InProgress,
    Completed,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, LedgerError> {
        match value {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(LedgerError::Serialization(format!(
                "Invalid status: {other}"
            ))),
        }
    }
}

/// Ledger record keyed by queue message id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub message_id: String,
    pub status: LedgerStatus,
    pub created_at: i64, // Unix timestamp s
    pub ttl: i64,        // Unix timestamp s
    pub completed_at: Option<i64>,
}

impl LedgerEntry {
    /// An entry past its ttl no longer blocks acquisition, even if the
    /// store has not swept it yet.
    pub fn is_live(&self, now: i64) -> bool {
        self.ttl >= now
    }
}

/// Result of a conditional insert
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// This caller owns the message until `complete` or `release`
    Acquired,
    /// A live entry exists: another invocation holds the lock or already
    /// delivered the message
    AlreadyInProgress,
}

/// Conditional-put key-value store used as a per-message lock and completion record
#[async_trait]
pub trait IdempotencyLedger: Send + Sync + Debug {
    /// Get backend name for logging
    fn backend_name(&self) -> &'static str;

    /// Insert an `IN_PROGRESS` entry unless a live entry already exists
    async fn acquire(&self, message_id: &str) -> Result<Acquisition, LedgerError>;

    /// Mark the entry `COMPLETED` and extend its ttl
    async fn complete(&self, message_id: &str) -> Result<(), LedgerError>;

    /// Delete an `IN_PROGRESS` entry so a redelivery can acquire it again.
    /// Absent or completed entries are left alone.
    async fn release(&self, message_id: &str) -> Result<(), LedgerError>;
}
