// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use parking_lot::Mutex;
use tick::Clock;

use super::state::{BreakerState, Enter, Exit, Outcome};
use super::{BreakerError, BreakerOptions, BreakerSnapshot, CircuitOpenError, CircuitState, DependencyId};
use crate::telemetry::TelemetryHelper;
use crate::{Recovery, RecoveryInfo, ResilienceContext, is_transient};

/// Guards calls to one upstream dependency.
///
/// While **closed**, calls pass through and consecutive transient failures are counted. Reaching
/// the failure threshold **opens** the breaker: calls are rejected with [`CircuitOpenError`]
/// without invoking the operation. Once the reset timeout has elapsed, the next call moves the
/// breaker to **half-open** and is let through as a trial. Enough trial successes close the
/// breaker; a single trial failure opens it again.
///
/// Only transient failures count against the dependency. A permanent error, such as a
/// validation failure, proves the dependency answered and counts as a success.
///
/// A half-open breaker lets one trial call through at a time. Calls arriving while a trial is
/// in flight are rejected with a zero retry-after.
///
/// # Examples
///
/// ```
/// use innkeep_resilience::breaker::{BreakerError, BreakerOptions, CircuitBreaker, CircuitState};
/// use innkeep_resilience::{RecoveryInfo, ResilienceContext};
/// use tick::Clock;
///
/// # futures::executor::block_on(async {
/// let context = ResilienceContext::new(Clock::new_frozen());
/// let breaker = CircuitBreaker::new("payments", BreakerOptions::default().failure_threshold(1), &context);
///
/// let failed: Result<(), BreakerError<&str>> = breaker
///     .execute_with(|| async { Err("connection refused") }, |_| RecoveryInfo::retry())
///     .await;
/// assert!(matches!(failed, Err(BreakerError::Inner("connection refused"))));
/// assert_eq!(breaker.state(), CircuitState::Open);
///
/// let rejected: Result<(), BreakerError<&str>> = breaker
///     .execute_with(|| async { Ok(()) }, |_| RecoveryInfo::retry())
///     .await;
/// assert!(rejected.is_err_and(|e| e.is_open()));
/// # });
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: DependencyId,
    options: BreakerOptions,
    clock: Clock,
    state: Mutex<BreakerState>,
    telemetry: TelemetryHelper,
}

impl CircuitBreaker {
    /// Creates a closed breaker for `dependency`.
    #[must_use]
    pub fn new(dependency: impl Into<DependencyId>, options: BreakerOptions, context: &ResilienceContext) -> Self {
        Self {
            dependency: dependency.into(),
            options,
            clock: context.clock().clone(),
            state: Mutex::new(BreakerState::new()),
            telemetry: context.create_telemetry("circuit_breaker"),
        }
    }

    /// The dependency this breaker guards.
    #[must_use]
    pub fn dependency(&self) -> &DependencyId {
        &self.dependency
    }

    /// The options this breaker was created with.
    #[must_use]
    pub fn options(&self) -> &BreakerOptions {
        &self.options
    }

    /// Current state. An open breaker whose reset timeout has elapsed still reports
    /// [`CircuitState::Open`] until the next call moves it to half-open.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state.lock().snapshot().state
    }

    /// Current state and counters.
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.state.lock().snapshot()
    }

    /// Runs `operation` unless the breaker is open, classifying failures through the error's
    /// [`Recovery`] implementation.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] if the breaker rejected the call, or
    /// [`BreakerError::Inner`] with the operation's own error.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Recovery,
    {
        self.execute_with(operation, E::recovery).await
    }

    /// Runs `operation` unless the breaker is open, counting a failure against the dependency
    /// only when `classify` reports it as transient.
    ///
    /// If the returned future is dropped before the operation completes, no outcome is
    /// recorded and a half-open trial slot is released.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] if the breaker rejected the call, or
    /// [`BreakerError::Inner`] with the operation's own error.
    pub async fn execute_with<T, E, F, Fut, C>(&self, operation: F, classify: C) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> RecoveryInfo,
    {
        let admission = self.enter()?;

        let result = operation().await;
        let outcome = match &result {
            Err(error) if is_transient(&classify(error)) => Outcome::Failure,
            _ => Outcome::Success,
        };

        admission.complete(outcome);
        result.map_err(BreakerError::Inner)
    }

    fn enter(&self) -> Result<Admission<'_>, CircuitOpenError> {
        let now = self.clock.instant();
        let enter = self.state.lock().enter(now, &self.options);

        match enter {
            Enter::Accepted => Ok(Admission::new(self, false)),
            Enter::Trial => Ok(Admission::new(self, true)),
            Enter::HalfOpened => {
                tracing::event!(
                    name: "innkeep.circuit_breaker.half_open",
                    tracing::Level::INFO,
                    pipeline.name = %self.telemetry.pipeline_name,
                    circuit_breaker.id = %self.dependency,
                    circuit_breaker.state = CircuitState::HalfOpen.as_str(),
                );
                self.report_event("circuit_half_open");
                Ok(Admission::new(self, true))
            }
            Enter::Rejected { state, retry_after } => {
                self.emit_rejected(state, retry_after);
                Err(CircuitOpenError::new(self.dependency.clone(), retry_after))
            }
        }
    }

    fn exit(&self, outcome: Outcome, trial: bool) {
        let now = self.clock.instant();
        let exit = self.state.lock().exit(outcome, trial, now, &self.options);

        match exit {
            Exit::Unchanged => {}
            Exit::Opened { failure_count } => {
                tracing::event!(
                    name: "innkeep.circuit_breaker.opened",
                    tracing::Level::WARN,
                    pipeline.name = %self.telemetry.pipeline_name,
                    circuit_breaker.id = %self.dependency,
                    circuit_breaker.state = CircuitState::Open.as_str(),
                    circuit_breaker.failure_count = failure_count,
                    circuit_breaker.reset_timeout = self.options.get_reset_timeout().as_secs_f32(),
                );
                self.report_event("circuit_opened");
            }
            Exit::Reopened => {
                tracing::event!(
                    name: "innkeep.circuit_breaker.reopened",
                    tracing::Level::WARN,
                    pipeline.name = %self.telemetry.pipeline_name,
                    circuit_breaker.id = %self.dependency,
                    circuit_breaker.state = CircuitState::Open.as_str(),
                );
                self.report_event("circuit_reopened");
            }
            Exit::Closed => {
                tracing::event!(
                    name: "innkeep.circuit_breaker.closed",
                    tracing::Level::INFO,
                    pipeline.name = %self.telemetry.pipeline_name,
                    circuit_breaker.id = %self.dependency,
                    circuit_breaker.state = CircuitState::Closed.as_str(),
                );
                self.report_event("circuit_closed");
            }
        }
    }

    fn emit_rejected(&self, state: CircuitState, retry_after: Duration) {
        tracing::event!(
            name: "innkeep.circuit_breaker.rejected",
            tracing::Level::WARN,
            pipeline.name = %self.telemetry.pipeline_name,
            circuit_breaker.id = %self.dependency,
            circuit_breaker.state = state.as_str(),
            circuit_breaker.retry_after = retry_after.as_secs_f32(),
        );
        self.report_event("circuit_rejected");
    }

    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, clippy::unused_self, reason = "unused without the metrics feature")
    )]
    fn report_event(&self, event_name: &'static str) {
        #[cfg(any(feature = "metrics", test))]
        self.telemetry.report_event(
            event_name,
            &[opentelemetry::KeyValue::new(
                crate::telemetry::BREAKER_ID,
                std::borrow::Cow::<'static, str>::from(self.dependency.clone()),
            )],
        );
    }
}

/// A call admitted by the breaker. Dropping it without [`complete`][Self::complete] releases a
/// half-open trial slot and records nothing else.
#[derive(Debug)]
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    completed: bool,
}

impl<'a> Admission<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            completed: false,
        }
    }

    fn complete(mut self, outcome: Outcome) {
        self.completed = true;
        self.breaker.exit(outcome, self.trial);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.trial && !self.completed {
            self.breaker.state.lock().abandon_trial();
        }
    }
}
