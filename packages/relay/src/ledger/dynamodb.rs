//! DynamoDB ledger with native TTL
//!
//! One item per message, hash key `messageId`. The conditional `PutItem` is
//! the lock; DynamoDB TTL on the `ttl` attribute garbage-collects entries.
//! Because the TTL sweep lags behind the attribute, acquisition also succeeds
//! over an item whose `ttl` is already in the past.

use super::types::*;
use crate::error::LedgerError;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::{
    Client,
    error::DisplayErrorContext,
    types::{
        AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
        ScalarAttributeType, TimeToLiveSpecification,
    },
};

const KEY_ATTRIBUTE: &str = "messageId";
const TTL_ATTRIBUTE: &str = "ttl";

pub struct DynamoDbLedger {
    client: Client,
    table: String,
    ttl: LedgerTtl,
}

impl std::fmt::Debug for DynamoDbLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbLedger")
            .field("table", &self.table)
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn unavailable<E: std::error::Error>(e: E) -> LedgerError {
    LedgerError::Unavailable(DisplayErrorContext(e).to_string())
}

fn key(message_id: &str) -> AttributeValue {
    AttributeValue::S(message_id.to_string())
}

fn number(value: i64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

impl DynamoDbLedger {
    pub fn new(aws_config: &SdkConfig, table: impl Into<String>, ttl: LedgerTtl) -> Self {
        Self::with_client(Client::new(aws_config), table, ttl)
    }

    pub fn with_client(client: Client, table: impl Into<String>, ttl: LedgerTtl) -> Self {
        Self {
            client,
            table: table.into(),
            ttl,
        }
    }

    /// Create the table and enable TTL if it does not exist yet (local development)
    pub async fn ensure_table(&self) -> Result<(), LedgerError> {
        let tables = self
            .client
            .list_tables()
            .send()
            .await
            .map_err(unavailable)?;

        if tables.table_names().iter().any(|t| t == &self.table) {
            return Ok(());
        }

        let definition = AttributeDefinition::builder()
            .attribute_name(KEY_ATTRIBUTE)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(unavailable)?;
        let key_schema = KeySchemaElement::builder()
            .attribute_name(KEY_ATTRIBUTE)
            .key_type(KeyType::Hash)
            .build()
            .map_err(unavailable)?;

        self.client
            .create_table()
            .table_name(&self.table)
            .attribute_definitions(definition)
            .key_schema(key_schema)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(unavailable)?;

        let ttl_spec = TimeToLiveSpecification::builder()
            .attribute_name(TTL_ATTRIBUTE)
            .enabled(true)
            .build()
            .map_err(unavailable)?;

        if let Err(e) = self
            .client
            .update_time_to_live()
            .table_name(&self.table)
            .time_to_live_specification(ttl_spec)
            .send()
            .await
        {
            // Some local emulators reject TTL updates; the ledger still works without the sweep
            tracing::warn!(table = %self.table, error = %DisplayErrorContext(&e), "Could not enable ledger TTL");
        }

        tracing::info!(table = %self.table, "Created ledger table");
        Ok(())
    }
}

#[async_trait]
impl IdempotencyLedger for DynamoDbLedger {
    fn backend_name(&self) -> &'static str {
        "dynamodb"
    }

    async fn acquire(&self, message_id: &str) -> Result<Acquisition, LedgerError> {
        let now = chrono::Utc::now().timestamp();

        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .item(KEY_ATTRIBUTE, key(message_id))
            .item(
                "status",
                AttributeValue::S(LedgerStatus::InProgress.as_str().to_string()),
            )
            .item("createdAt", number(now))
            .item(
                TTL_ATTRIBUTE,
                number(now.saturating_add(self.ttl.in_progress_secs)),
            )
            .condition_expression("attribute_not_exists(#id) OR #ttl < :now")
            .expression_attribute_names("#id", KEY_ATTRIBUTE)
            .expression_attribute_names("#ttl", TTL_ATTRIBUTE)
            .expression_attribute_values(":now", number(now))
            .send()
            .await;

        match result {
            Ok(_) => Ok(Acquisition::Acquired),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                tracing::debug!(message_id, "Ledger entry already exists");
                Ok(Acquisition::AlreadyInProgress)
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn complete(&self, message_id: &str) -> Result<(), LedgerError> {
        let now = chrono::Utc::now().timestamp();

        self.client
            .update_item()
            .table_name(&self.table)
            .key(KEY_ATTRIBUTE, key(message_id))
            .update_expression(
                "SET #status = :completed, #ttl = :ttl, completedAt = :now, \
                 createdAt = if_not_exists(createdAt, :now)",
            )
            .expression_attribute_names("#status", "status")
            .expression_attribute_names("#ttl", TTL_ATTRIBUTE)
            .expression_attribute_values(
                ":completed",
                AttributeValue::S(LedgerStatus::Completed.as_str().to_string()),
            )
            .expression_attribute_values(
                ":ttl",
                number(now.saturating_add(self.ttl.completed_secs)),
            )
            .expression_attribute_values(":now", number(now))
            .send()
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn release(&self, message_id: &str) -> Result<(), LedgerError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table)
            .key(KEY_ATTRIBUTE, key(message_id))
            .condition_expression("#status = :in_progress")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":in_progress",
                AttributeValue::S(LedgerStatus::InProgress.as_str().to_string()),
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                tracing::debug!(message_id, "Nothing to release");
                Ok(())
            }
            Err(e) => Err(unavailable(e)),
        }
    }
}
