//! Store configuration.
//!
//! Everything here is optional; `Config::default()` is a store with manual
//! GC, no idle timeout and no background maintenance thread.
//!
//! # Example
//!
//! ```
//! use snapkv::{Config, GcPolicy};
//!
//! let config: Config = serde_json::from_str(
//!     r#"{ "gc": { "mode": "every_commits", "commits": 100 }, "idle_timeout_ms": 30000 }"#,
//! )
//! .unwrap();
//! assert_eq!(config.gc, GcPolicy::EveryCommits { commits: 100 });
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When garbage collection runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GcPolicy {
    /// Only when the caller invokes `gc()` (or the maintenance thread ticks)
    #[default]
    Manual,
    /// After every `commits` version-consuming commits
    EveryCommits {
        /// Commit count between passes; must be non-zero
        commits: u64,
    },
}

/// Configuration for transaction retry behavior
///
/// Used by [`SnapKv::transaction_with_retry`](crate::SnapKv::transaction_with_retry).
///
/// # Example
/// ```
/// use snapkv::RetryConfig;
///
/// let config = RetryConfig::new()
///     .with_max_retries(5)
///     .with_base_delay_ms(2);
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: usize,
    /// Base delay between retries in milliseconds (exponential backoff)
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 50,
        }
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RetryConfig with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set base delay for exponential backoff
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set maximum delay between retries
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Delay before retry number `attempt` (exponential backoff, capped)
    pub(crate) fn calculate_delay(&self, attempt: usize) -> Duration {
        // Cap the shift to prevent overflow
        let shift = attempt.min(63);
        let multiplier = 1u64 << shift;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Garbage-collection trigger
    pub gc: GcPolicy,
    /// Force-abort transactions idle longer than this
    pub idle_timeout_ms: Option<u64>,
    /// Run reaping and GC on a background thread at this interval
    pub maintenance_interval_ms: Option<u64>,
    /// Retry policy for `transaction_with_retry`
    pub retry: RetryConfig,
    /// Number of keys to pre-size the store for
    pub initial_capacity: usize,
}

impl Config {
    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.gc == (GcPolicy::EveryCommits { commits: 0 }) {
            return Err(Error::Config("gc.commits must be at least 1".to_string()));
        }
        if self.maintenance_interval_ms == Some(0) {
            return Err(Error::Config(
                "maintenance_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.idle_timeout_ms == Some(0) {
            return Err(Error::Config("idle_timeout_ms must be at least 1".to_string()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::Config(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Idle timeout as a `Duration`
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    /// Maintenance interval as a `Duration`
    pub fn maintenance_interval(&self) -> Option<Duration> {
        self.maintenance_interval_ms.map(Duration::from_millis)
    }
}
