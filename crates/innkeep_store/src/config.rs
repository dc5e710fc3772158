// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::time::Duration;

use innkeep_resilience::breaker::{
    BreakerOptions, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT, DEFAULT_SUCCESS_THRESHOLD,
};
use innkeep_resilience::retry::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY, DEFAULT_JITTER, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES, RetryPolicy,
};
use serde::{Deserialize, Serialize};

/// Dependency name used when a query does not name one.
pub const DEFAULT_DEPENDENCY: &str = "remote_store";

/// Pipeline name reported in logs and metrics when none is configured.
pub const DEFAULT_PIPELINE_NAME: &str = "data_access";

/// Serializable settings of a [`ResilientExecutor`][crate::ResilientExecutor].
///
/// Every field is optional when deserializing; missing fields take their defaults.
///
/// # Examples
///
/// ```
/// use innkeep_store::StoreConfig;
///
/// let config: StoreConfig = serde_json::from_str(
///     r#"{
///         "retry": { "max_retries": 5 },
///         "dependencies": { "payments": { "failure_threshold": 2 } }
///     }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.retry.max_retries, 5);
/// assert_eq!(config.retry.initial_delay_ms, 1000);
/// assert_eq!(config.dependencies["payments"].reset_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct StoreConfig {
    /// Pipeline name reported in logs and metrics.
    pub name: String,

    /// Dependency whose breaker guards queries that do not name one.
    pub default_dependency: String,

    /// Retry schedule shared by every query.
    pub retry: RetryConfig,

    /// Breaker settings of every dependency without an entry in `dependencies`.
    pub breaker: BreakerConfig,

    /// Breaker settings of individual dependencies.
    pub dependencies: BTreeMap<String, BreakerConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PIPELINE_NAME.to_string(),
            default_dependency: DEFAULT_DEPENDENCY.to_string(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            dependencies: BTreeMap::new(),
        }
    }
}

/// Retry schedule. Delays are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub initial_delay_ms: u64,
    /// Cap on the base delay.
    pub max_delay_ms: u64,
    /// Growth factor of the base delay.
    pub backoff_multiplier: f64,
    /// Randomizes each delay within 50% to 150% of its base.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: millis(DEFAULT_INITIAL_DELAY),
            max_delay_ms: millis(DEFAULT_MAX_DELAY),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryConfig {
    /// Applies this schedule to `policy`.
    #[must_use]
    pub fn apply(&self, policy: RetryPolicy) -> RetryPolicy {
        policy
            .max_retries(self.max_retries)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .backoff_multiplier(self.backoff_multiplier)
            .jitter(self.jitter)
    }
}

/// Circuit breaker thresholds. The reset timeout is in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct BreakerConfig {
    /// Consecutive transient failures that open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open before a trial call.
    pub reset_timeout_secs: u64,
    /// Trial successes that close the breaker.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_secs: DEFAULT_RESET_TIMEOUT.as_secs(),
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

impl BreakerConfig {
    /// Converts the thresholds to [`BreakerOptions`]. Zero thresholds are raised to one.
    #[must_use]
    pub fn to_options(&self) -> BreakerOptions {
        BreakerOptions::default()
            .failure_threshold(self.failure_threshold)
            .reset_timeout(Duration::from_secs(self.reset_timeout_secs))
            .success_threshold(self.success_threshold)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
