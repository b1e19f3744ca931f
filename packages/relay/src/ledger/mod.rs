//! Idempotency ledger
//!
//! A conditional-put key-value store used as a distributed lock and
//! completion record, keyed by queue message id:
//!
//! | Operation | Store call | Outcome |
//! |-----------|------------|---------|
//! | `acquire` | conditional insert, `IN_PROGRESS` + short ttl | `Acquired` or `AlreadyInProgress` |
//! | `complete` | update, `COMPLETED` + long ttl | |
//! | `release` | delete if still `IN_PROGRESS` | |
//!
//! ## Backends
//!
//! - **DynamoDB** (feature `dynamodb`): the production store. TTL on the `ttl`
//!   attribute removes entries after the duplicate-suppression window.
//! - **Memory**: same semantics in-process, for tests and local runs.
//!
//! ## Configuration
//!
//! ```bash
//! LEDGER_TABLE_NAME=webhook-relay-ledger
//! LEDGER_IN_PROGRESS_TTL=900     # lock lifetime, outlives the Lambda timeout
//! LEDGER_COMPLETED_TTL=86400     # duplicate-suppression window
//! ```

mod memory;
mod types;

#[cfg(feature = "dynamodb")]
mod dynamodb;

pub use memory::InMemoryLedger;
pub use types::*;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbLedger;
