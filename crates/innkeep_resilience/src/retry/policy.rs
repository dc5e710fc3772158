// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use super::backoff::Backoff;
use super::{DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY, DEFAULT_JITTER, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES};
use crate::rnd::Rnd;
use crate::telemetry::TelemetryHelper;
use crate::{Recovery, RecoveryInfo, ResilienceContext, is_transient};

type OnRetry = Arc<dyn Fn(RetryAttempt, &RecoveryInfo) + Send + Sync>;

/// Describes a retry that is about to happen.
///
/// Exists only for the duration of one [`RetryPolicy::execute`] call and is handed to the
/// [`on_retry`][RetryPolicy::on_retry] callback just before the backoff sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct RetryAttempt {
    /// The retry number, starting at 1 for the first retry after the initial attempt.
    pub number: u32,

    /// How long the policy sleeps before running the attempt.
    pub delay: Duration,
}

/// Re-runs failed operations with exponential backoff and jitter.
///
/// An operation is attempted once and then retried up to [`max_retries`][Self::max_retries]
/// times, as long as each failure is transient. A permanent failure is returned immediately.
/// Once retries are exhausted the last error is returned. There is no sleep after the final
/// attempt.
///
/// Before retry `n` the policy sleeps for a delay drawn from `[0.5 * d, 1.5 * d)`, where
/// `d = min(initial_delay * multiplier^(n-1), max_delay)`. If the failure carries its own delay
/// hint (see [`RecoveryInfo::delay`]) the hint is used instead.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use innkeep_resilience::retry::RetryPolicy;
/// use innkeep_resilience::{RecoveryInfo, ResilienceContext};
/// use tick::ClockControl;
///
/// # futures::executor::block_on(async {
/// let clock = ClockControl::new().auto_advance_timers(true).to_clock();
/// let context = ResilienceContext::new(&clock).name("bookings");
///
/// let policy = RetryPolicy::new(&context)
///     .max_retries(2)
///     .initial_delay(Duration::from_millis(200));
///
/// let mut calls = 0;
/// let result: Result<u32, &str> = policy
///     .execute_with(
///         || {
///             calls += 1;
///             let outcome = if calls < 3 { Err("connection reset") } else { Ok(7) };
///             async move { outcome }
///         },
///         |_| RecoveryInfo::retry(),
///     )
///     .await;
///
/// assert_eq!(result, Ok(7));
/// assert_eq!(calls, 3);
/// # });
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter: bool,
    on_retry: Option<OnRetry>,
    clock: Clock,
    telemetry: TelemetryHelper,
    rnd: Rnd,
}

impl RetryPolicy {
    /// Creates a policy with the default schedule: 3 retries starting at 1 s, doubling up to
    /// 10 s, with jitter.
    #[must_use]
    pub fn new(context: &ResilienceContext) -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: DEFAULT_JITTER,
            on_retry: None,
            clock: context.clock().clone(),
            telemetry: context.create_telemetry("retry"),
            rnd: Rnd::default(),
        }
    }

    /// Maximum number of retries after the initial attempt. Zero disables retrying.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base delay before the first retry.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Upper bound of the base delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Growth factor of the base delay between retries. Negative values are treated as zero.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(0.0);
        self
    }

    /// Enables or disables jitter. Without jitter the schedule is deterministic.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Registers a callback that runs just before each backoff sleep.
    #[must_use]
    pub fn on_retry(mut self, on_retry: impl Fn(RetryAttempt, &RecoveryInfo) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(on_retry));
        self
    }

    /// The configured maximum number of retries.
    #[must_use]
    pub fn get_max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Runs `operation`, retrying transient failures as classified by the error's
    /// [`Recovery`] implementation.
    ///
    /// # Errors
    ///
    /// Returns the first permanent error, or the last error once retries are exhausted.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Recovery,
    {
        self.execute_with(operation, E::recovery).await
    }

    /// Runs `operation`, retrying failures that `classify` reports as transient.
    ///
    /// # Errors
    ///
    /// Returns the first permanent error, or the last error once retries are exhausted.
    pub async fn execute_with<T, E, F, Fut, C>(&self, mut operation: F, classify: C) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> RecoveryInfo,
    {
        let mut delays = self.delays();
        let mut retries = 0_u32;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let recovery = classify(&error);
            if !is_transient(&recovery) || retries >= self.max_retries {
                return Err(error);
            }

            retries += 1;
            let backoff = delays.next().unwrap_or(self.max_delay);
            let attempt = RetryAttempt {
                number: retries,
                delay: recovery.get_delay().unwrap_or(backoff),
            };

            self.emit_telemetry(attempt, &recovery);

            if let Some(on_retry) = &self.on_retry {
                on_retry(attempt, &recovery);
            }

            self.clock.delay(attempt.delay).await;
        }
    }

    fn delays(&self) -> Backoff {
        Backoff::new(
            self.initial_delay,
            self.max_delay,
            self.backoff_multiplier,
            self.jitter,
            self.rnd.clone(),
        )
    }

    fn emit_telemetry(&self, attempt: RetryAttempt, recovery: &RecoveryInfo) {
        tracing::event!(
            name: "innkeep.retry",
            tracing::Level::WARN,
            pipeline.name = %self.telemetry.pipeline_name,
            strategy.name = %self.telemetry.strategy_name,
            resilience.attempt.number = attempt.number,
            resilience.attempt.is_last = attempt.number == self.max_retries,
            resilience.retry.delay = attempt.delay.as_secs_f32(),
            resilience.recovery = %recovery,
        );

        #[cfg(any(feature = "metrics", test))]
        self.telemetry.report_event(
            "retry",
            &[opentelemetry::KeyValue::new(
                crate::telemetry::ATTEMPT_NUMBER,
                i64::from(attempt.number),
            )],
        );
    }

    #[cfg(test)]
    fn with_rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }
}

impl Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("pipeline", &self.telemetry.pipeline_name)
            .finish_non_exhaustive()
    }
}
