//! Webhook directory cache
//!
//! The directory maps webhook keys to destination URLs and lives in a secret
//! store as a single JSON object. One snapshot is held per process together
//! with the instant it was fetched; it is reused until the TTL elapses and is
//! replaced wholesale on refresh, so concurrent resolvers never see a partially
//! updated map.
//!
//! When a refresh fails the cache follows its [`StalePolicy`]: either keep
//! answering from the expired snapshot or surface
//! [`DirectoryError::Unavailable`]. The expired snapshot is never evicted by a
//! failed refresh. Under `ServeStale` the failed attempt starts a new TTL
//! window, so an outage costs one fetch per window rather than one per
//! resolve.

use crate::config::StalePolicy;
use crate::error::DirectoryError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Where the directory secret comes from
#[async_trait]
pub trait SecretSource: Send + Sync + Debug {
    /// Name for logging
    fn source_name(&self) -> &'static str;

    /// Fetch the raw secret string (a JSON object of key -> URL)
    async fn fetch(&self) -> Result<String, DirectoryError>;
}

/// Fixed directory, for local runs and tests
#[derive(Debug, Clone)]
pub struct StaticSecretSource {
    secret: String,
}

impl StaticSecretSource {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl SecretSource for StaticSecretSource {
    fn source_name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> Result<String, DirectoryError> {
        Ok(self.secret.clone())
    }
}

#[cfg(feature = "secretsmanager")]
pub use secrets_manager::SecretsManagerSource;

#[cfg(feature = "secretsmanager")]
mod secrets_manager {
    use super::*;
    use aws_config::SdkConfig;
    use aws_sdk_secretsmanager::{Client, error::DisplayErrorContext};

    /// AWS Secrets Manager backed directory
    pub struct SecretsManagerSource {
        client: Client,
        secret_id: String,
    }

    impl Debug for SecretsManagerSource {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SecretsManagerSource")
                .field("secret_id", &self.secret_id)
                .finish()
        }
    }

    impl SecretsManagerSource {
        pub fn new(aws_config: &SdkConfig, secret_id: impl Into<String>) -> Self {
            Self {
                client: Client::new(aws_config),
                secret_id: secret_id.into(),
            }
        }
    }

    #[async_trait]
    impl SecretSource for SecretsManagerSource {
        fn source_name(&self) -> &'static str {
            "secretsmanager"
        }

        async fn fetch(&self) -> Result<String, DirectoryError> {
            let output = self
                .client
                .get_secret_value()
                .secret_id(&self.secret_id)
                .send()
                .await
                .map_err(|e| DirectoryError::Unavailable(DisplayErrorContext(&e).to_string()))?;

            output
                .secret_string()
                .map(str::to_owned)
                .ok_or_else(|| DirectoryError::Unavailable("secret has no SecretString".into()))
        }
    }
}

#[derive(Debug)]
struct Snapshot {
    routes: Arc<HashMap<String, String>>,
    /// Last successful fetch
    fetched_at: Instant,
    /// Last fetch attempt; the TTL runs from here
    checked_at: Instant,
}

/// TTL-bounded cache over a [`SecretSource`]
#[derive(Debug)]
pub struct DirectoryCache {
    source: Arc<dyn SecretSource>,
    ttl: Duration,
    policy: StalePolicy,
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl DirectoryCache {
    pub fn new(source: Arc<dyn SecretSource>, ttl: Duration, policy: StalePolicy) -> Self {
        Self {
            source,
            ttl,
            policy,
            current: RwLock::new(None),
        }
    }

    /// Resolve a webhook key to its destination URL
    pub async fn resolve(&self, key: &str) -> Result<String, DirectoryError> {
        let snapshot = self.snapshot().await?;
        snapshot
            .routes
            .get(key)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownKey(key.to_string()))
    }

    /// Number of keys in the held snapshot, if any
    pub fn cached_len(&self) -> Option<usize> {
        self.current.read().as_ref().map(|s| s.routes.len())
    }

    async fn snapshot(&self) -> Result<Arc<Snapshot>, DirectoryError> {
        let cached = self.current.read().clone();
        if let Some(snapshot) = &cached
            && snapshot.checked_at.elapsed() < self.ttl
        {
            return Ok(snapshot.clone());
        }

        match self.refresh().await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => match (self.policy, cached) {
                (StalePolicy::ServeStale, Some(stale)) => {
                    tracing::warn!(
                        error = %err,
                        age_secs = stale.fetched_at.elapsed().as_secs_f64(),
                        "Directory refresh failed, serving stale snapshot"
                    );
                    let restamped = Arc::new(Snapshot {
                        routes: stale.routes.clone(),
                        fetched_at: stale.fetched_at,
                        checked_at: Instant::now(),
                    });
                    *self.current.write() = Some(restamped.clone());
                    Ok(restamped)
                }
                _ => {
                    tracing::error!(error = %err, "Directory refresh failed");
                    Err(err)
                }
            },
        }
    }

    async fn refresh(&self) -> Result<Arc<Snapshot>, DirectoryError> {
        tracing::info!(source = self.source.source_name(), "Fetching webhook directory");

        let raw = self.source.fetch().await?;
        let routes: HashMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
            DirectoryError::Unavailable(format!("directory secret is not a key/URL map: {e}"))
        })?;

        let now = Instant::now();
        let snapshot = Arc::new(Snapshot {
            routes: Arc::new(routes),
            fetched_at: now,
            checked_at: now,
        });
        *self.current.write() = Some(snapshot.clone());

        tracing::debug!(keys = snapshot.routes.len(), "Webhook directory refreshed");
        Ok(snapshot)
    }
}
