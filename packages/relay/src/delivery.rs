//! Outbound webhook delivery
//!
//! Retries on 429, 5xx and transport failures with exponential backoff.
//! Only POST is ever issued; repeating it is safe because the ledger admits a
//! message into delivery at most once.

use crate::config::DeliveryConfig;
use crate::error::DeliveryError;
use async_trait::async_trait;
use reqwest::{
    StatusCode,
    header::{HeaderMap, RETRY_AFTER},
};
use serde_json::{Value, json};
use std::fmt::Debug;
use std::time::Duration;

/// Upper bound for any single backoff sleep
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

#[async_trait]
pub trait WebhookSender: Send + Sync + Debug {
    async fn deliver(&self, url: &str, payload: &Value) -> Result<(), DeliveryError>;
}

/// Request body for a payload: objects and arrays go out as-is, anything else
/// is wrapped as a chat text message.
pub fn webhook_body(payload: &Value) -> Value {
    match payload {
        Value::Object(_) | Value::Array(_) => payload.clone(),
        Value::String(text) => json!({ "text": text }),
        other => json!({ "text": other.to_string() }),
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    config: DeliveryConfig,
}

impl DeliveryClient {
    pub fn new(config: DeliveryConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: DeliveryConfig) -> Self {
        Self { client, config }
    }

    /// Sleep before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(30) as i32;
        let secs = self.config.backoff_factor * 2f64.powi(exponent);
        if !secs.is_finite() || secs >= MAX_BACKOFF.as_secs_f64() {
            return MAX_BACKOFF;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

fn is_retriable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Numeric `Retry-After` on 429/503, capped at [`MAX_BACKOFF`]
fn retry_after(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_BACKOFF))
}

#[async_trait]
impl WebhookSender for DeliveryClient {
    async fn deliver(&self, url: &str, payload: &Value) -> Result<(), DeliveryError> {
        let body = webhook_body(payload);
        let max_attempts = self.config.retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = self
                .client
                .post(url)
                .timeout(self.config.timeout())
                .json(&body)
                .send()
                .await;

            let (failure, hint) = match result {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(attempt, status = %response.status(), "Webhook accepted");
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let hint = retry_after(status, response.headers());
                    let text = response.text().await.unwrap_or_default();
                    let failure = DeliveryError::status(status.as_u16(), attempt, &text);
                    if !is_retriable_status(status) {
                        tracing::warn!(attempt, status = %status, body = %text, "Webhook rejected message");
                        return Err(failure);
                    }
                    tracing::warn!(attempt, status = %status, body = %text, "Webhook call failed");
                    (failure, hint)
                }
                Err(e) if e.is_builder() => {
                    return Err(DeliveryError::transport(attempt, e.to_string()));
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, timeout = e.is_timeout(), "Webhook call error");
                    (DeliveryError::transport(attempt, e.to_string()), None)
                }
            };

            if attempt >= max_attempts {
                return Err(failure);
            }

            let delay = hint.unwrap_or_else(|| self.backoff(attempt)).min(MAX_BACKOFF);
            tokio::time::sleep(delay).await;
        }
    }
}
