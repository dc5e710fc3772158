// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Consecutive transient failures that open a closed breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// How long an open breaker rejects calls before letting a trial through.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Trial successes that close a half-open breaker.
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Thresholds and timing of a [`CircuitBreaker`][super::CircuitBreaker].
///
/// Thresholds below 1 are raised to 1.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use innkeep_resilience::breaker::BreakerOptions;
///
/// let options = BreakerOptions::default()
///     .failure_threshold(3)
///     .reset_timeout(Duration::from_secs(10));
///
/// assert_eq!(options.get_failure_threshold(), 3);
/// assert_eq!(options.get_success_threshold(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerOptions {
    failure_threshold: u32,
    reset_timeout: Duration,
    success_threshold: u32,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

impl BreakerOptions {
    /// Sets how many consecutive transient failures open the breaker.
    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets how long the breaker stays open before allowing a trial call.
    #[must_use]
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Sets how many trial successes close a half-open breaker.
    #[must_use]
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    /// Consecutive transient failures that open the breaker.
    #[must_use]
    pub fn get_failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// How long the breaker stays open before allowing a trial call.
    #[must_use]
    pub fn get_reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Trial successes that close a half-open breaker.
    #[must_use]
    pub fn get_success_threshold(&self) -> u32 {
        self.success_threshold
    }
}
