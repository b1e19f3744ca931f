use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Longest accepted ledger entry lifetime (ten years)
pub const MAX_LEDGER_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Longest accepted single webhook attempt
pub const MAX_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(900);

/// What the directory cache does when a refresh fails and an expired snapshot exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StalePolicy {
    /// Keep serving the expired snapshot until a refresh succeeds
    #[default]
    ServeStale,
    /// Surface the refresh failure
    Fail,
}

impl FromStr for StalePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "serve-stale" | "serve_stale" | "stale" => Ok(Self::ServeStale),
            "fail" | "strict" => Ok(Self::Fail),
            other => Err(format!("unknown stale policy '{other}'")),
        }
    }
}

/// How the batch processor reports messages that can never succeed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalFailurePolicy {
    /// Report for redelivery; the queue's redrive policy dead-letters them
    #[default]
    Retry,
    /// Acknowledge and log
    Drop,
}

impl FromStr for TerminalFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retry" | "dead-letter" | "dlq" => Ok(Self::Retry),
            "drop" | "skip" => Ok(Self::Drop),
            other => Err(format!("unknown terminal failure policy '{other}'")),
        }
    }
}

/// Outbound webhook call settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Per-attempt timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// Additional attempts after the first one
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Exponential backoff base (seconds)
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_timeout_secs() -> f64 {
    5.0
}
fn default_retries() -> u32 {
    2
}
fn default_backoff_factor() -> f64 {
    0.5
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl DeliveryConfig {
    /// Out-of-range values clamp to [`MAX_WEBHOOK_TIMEOUT`]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .unwrap_or(MAX_WEBHOOK_TIMEOUT)
            .min(MAX_WEBHOOK_TIMEOUT)
    }
}

/// Lifetimes of ledger entries, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTtl {
    /// Lock lifetime; must outlive the longest invocation
    pub in_progress_secs: i64,
    /// Duplicate-suppression window after a successful delivery
    pub completed_secs: i64,
}

impl Default for LedgerTtl {
    fn default() -> Self {
        Self {
            in_progress_secs: 15 * 60,
            completed_secs: 24 * 60 * 60,
        }
    }
}

/// Notifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub secret_id: String,
    pub ledger_table: String,
    pub cache_ttl_secs: f64,
    pub delivery: DeliveryConfig,
    pub ledger_ttl: LedgerTtl,
    pub stale_policy: StalePolicy,
    pub terminal_failure_policy: TerminalFailurePolicy,
    pub deadline_margin_ms: u64,
    /// Create the ledger table at startup when missing (local stacks)
    pub ensure_ledger_table: bool,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Missing optional keys take their defaults,
    /// present but unparsable values are rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = DeliveryConfig::default();
        let ledger_defaults = LedgerTtl::default();

        let cache_ttl_secs = parsed(&lookup, "SECRET_CACHE_TTL", 60.0)?;
        duration_secs("SECRET_CACHE_TTL", cache_ttl_secs)?;

        let timeout_secs = parsed(&lookup, "WEBHOOK_TIMEOUT", defaults.timeout_secs)?;
        let timeout = duration_secs("WEBHOOK_TIMEOUT", timeout_secs)?;
        if timeout.is_zero() || timeout > MAX_WEBHOOK_TIMEOUT {
            return Err(ConfigError::Invalid {
                key: "WEBHOOK_TIMEOUT",
                reason: format!(
                    "must be greater than zero and at most {} seconds",
                    MAX_WEBHOOK_TIMEOUT.as_secs()
                ),
            });
        }

        let backoff_factor = parsed(&lookup, "WEBHOOK_BACKOFF", defaults.backoff_factor)?;
        duration_secs("WEBHOOK_BACKOFF", backoff_factor)?;

        let in_progress_secs: i64 = parsed(
            &lookup,
            "LEDGER_IN_PROGRESS_TTL",
            ledger_defaults.in_progress_secs,
        )?;
        let completed_secs: i64 = parsed(
            &lookup,
            "LEDGER_COMPLETED_TTL",
            ledger_defaults.completed_secs,
        )?;
        for (key, value) in [
            ("LEDGER_IN_PROGRESS_TTL", in_progress_secs),
            ("LEDGER_COMPLETED_TTL", completed_secs),
        ] {
            if value <= 0 || value > MAX_LEDGER_TTL_SECS {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("must be between 1 and {MAX_LEDGER_TTL_SECS} seconds"),
                });
            }
        }

        Ok(Self {
            secret_id: required(&lookup, "SECRET_ARN")?,
            ledger_table: required(&lookup, "LEDGER_TABLE_NAME")?,
            cache_ttl_secs,
            delivery: DeliveryConfig {
                timeout_secs,
                retries: parsed(&lookup, "WEBHOOK_RETRIES", defaults.retries)?,
                backoff_factor,
            },
            ledger_ttl: LedgerTtl {
                in_progress_secs,
                completed_secs,
            },
            stale_policy: parsed(&lookup, "DIRECTORY_STALE_POLICY", StalePolicy::default())?,
            terminal_failure_policy: parsed(
                &lookup,
                "TERMINAL_FAILURE_POLICY",
                TerminalFailurePolicy::default(),
            )?,
            deadline_margin_ms: parsed(&lookup, "DEADLINE_MARGIN_MS", 2000)?,
            ensure_ledger_table: parsed(&lookup, "LEDGER_CREATE_TABLE", false)?,
        })
    }

    /// An unrepresentable ttl disables caching
    pub fn cache_ttl(&self) -> Duration {
        Duration::try_from_secs_f64(self.cache_ttl_secs).unwrap_or_default()
    }

    pub fn deadline_margin(&self) -> Duration {
        Duration::from_millis(self.deadline_margin_ms)
    }
}

/// Ingestion function configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub queue_url: String,
}

impl PublisherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            queue_url: required(&lookup, "QUEUE_URL")?,
        })
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}

/// Seconds that fit a [`Duration`]: finite, non-negative, not overflowing
fn duration_secs(key: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("{value} is not a usable number of seconds: {e}"),
    })
}
