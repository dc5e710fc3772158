// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;
use std::time::{Duration, Instant};

use super::BreakerOptions;

/// The three states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls pass through and failures are counted.
    Closed,

    /// Calls are rejected without reaching the dependency.
    Open,

    /// Trial calls pass through to decide whether the dependency has recovered.
    HalfOpen,
}

impl CircuitState {
    /// `snake_case` name used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker, for dashboards and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct BreakerSnapshot {
    /// Current state.
    pub state: CircuitState,

    /// Consecutive transient failures counted while closed.
    pub failure_count: u32,

    /// Trial successes counted while half-open.
    pub trial_success_count: u32,

    /// When the breaker last opened or re-opened.
    pub last_failure_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enter {
    Accepted,
    /// The breaker is half-open and admitted this call as its only trial.
    Trial,
    /// The breaker moved from open to half-open and admitted this call as a trial.
    HalfOpened,
    Rejected {
        state: CircuitState,
        retry_after: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exit {
    Unchanged,
    Opened { failure_count: u32 },
    Reopened,
    Closed,
}

/// State machine of one breaker. Time is passed in so the caller can read the clock outside
/// the lock.
#[derive(Debug)]
pub(crate) struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    trial_success_count: u32,
    trial_in_flight: bool,
    last_failure_at: Option<Instant>,
}

impl BreakerState {
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            trial_success_count: 0,
            trial_in_flight: false,
            last_failure_at: None,
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            failure_count: self.failure_count,
            trial_success_count: self.trial_success_count,
            last_failure_at: self.last_failure_at,
        }
    }

    /// Decides whether a call may proceed. An open breaker whose reset timeout has elapsed
    /// becomes half-open here; there is no background timer. A half-open breaker admits one
    /// trial at a time.
    pub fn enter(&mut self, now: Instant, options: &BreakerOptions) -> Enter {
        match self.state {
            CircuitState::Closed => Enter::Accepted,
            CircuitState::HalfOpen if self.trial_in_flight => Enter::Rejected {
                state: CircuitState::HalfOpen,
                retry_after: Duration::ZERO,
            },
            CircuitState::HalfOpen => {
                self.trial_in_flight = true;
                Enter::Trial
            }
            CircuitState::Open => {
                let opened_at = self.last_failure_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);

                if elapsed >= options.get_reset_timeout() {
                    self.state = CircuitState::HalfOpen;
                    self.trial_success_count = 0;
                    self.trial_in_flight = true;
                    Enter::HalfOpened
                } else {
                    Enter::Rejected {
                        state: CircuitState::Open,
                        retry_after: options.get_reset_timeout() - elapsed,
                    }
                }
            }
        }
    }

    /// Records the outcome of a call admitted by [`enter`][Self::enter]. `trial` tells whether
    /// the call was admitted as a half-open trial.
    pub fn exit(&mut self, outcome: Outcome, trial: bool, now: Instant, options: &BreakerOptions) -> Exit {
        if trial {
            self.trial_in_flight = false;
        }

        match (self.state, outcome) {
            (CircuitState::Closed, Outcome::Success) => {
                self.failure_count = 0;
                Exit::Unchanged
            }
            (CircuitState::Closed, Outcome::Failure) => {
                self.failure_count = self.failure_count.saturating_add(1);
                if self.failure_count >= options.get_failure_threshold() {
                    self.open(now);
                    Exit::Opened {
                        failure_count: self.failure_count,
                    }
                } else {
                    Exit::Unchanged
                }
            }
            // Admitted before another call opened the breaker; the result is stale.
            (CircuitState::Open, _) => Exit::Unchanged,
            (CircuitState::HalfOpen, _) if !trial => Exit::Unchanged,
            (CircuitState::HalfOpen, Outcome::Success) => {
                self.trial_success_count = self.trial_success_count.saturating_add(1);
                if self.trial_success_count >= options.get_success_threshold() {
                    self.state = CircuitState::Closed;
                    self.failure_count = 0;
                    self.trial_success_count = 0;
                    Exit::Closed
                } else {
                    Exit::Unchanged
                }
            }
            (CircuitState::HalfOpen, Outcome::Failure) => {
                self.failure_count = self.failure_count.saturating_add(1);
                self.open(now);
                Exit::Reopened
            }
        }
    }

    /// Releases the trial slot of a half-open call that was dropped before it finished.
    pub fn abandon_trial(&mut self) {
        self.trial_in_flight = false;
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.trial_success_count = 0;
        self.last_failure_at = Some(now);
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    const RESET: Duration = Duration::from_secs(30);

    fn options() -> BreakerOptions {
        BreakerOptions::default()
            .failure_threshold(3)
            .success_threshold(2)
            .reset_timeout(RESET)
    }

    fn opened(now: Instant) -> BreakerState {
        let mut state = BreakerState::new();
        for _ in 0..3 {
            assert_eq!(state.enter(now, &options()), Enter::Accepted);
            state.exit(Outcome::Failure, false, now, &options());
        }
        assert_eq!(state.snapshot().state, CircuitState::Open);
        state
    }

    #[test]
    fn starts_closed() {
        let state = BreakerState::new();

        assert_eq!(
            state.snapshot(),
            BreakerSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                trial_success_count: 0,
                last_failure_at: None,
            }
        );
    }

    #[test]
    fn opens_at_threshold() {
        let now = Instant::now();
        let mut state = BreakerState::new();

        assert_eq!(state.exit(Outcome::Failure, false, now, &options()), Exit::Unchanged);
        assert_eq!(state.exit(Outcome::Failure, false, now, &options()), Exit::Unchanged);
        assert_eq!(
            state.exit(Outcome::Failure, false, now, &options()),
            Exit::Opened { failure_count: 3 }
        );
        assert_eq!(state.snapshot().last_failure_at, Some(now));
    }

    #[test]
    fn success_resets_failure_count() {
        let now = Instant::now();
        let mut state = BreakerState::new();

        state.exit(Outcome::Failure, false, now, &options());
        state.exit(Outcome::Failure, false, now, &options());
        state.exit(Outcome::Success, false, now, &options());
        state.exit(Outcome::Failure, false, now, &options());

        assert_eq!(state.snapshot().failure_count, 1);
        assert_eq!(state.snapshot().state, CircuitState::Closed);
    }

    #[test]
    fn open_rejects_with_remaining_time() {
        let now = Instant::now();
        let mut state = opened(now);

        assert_eq!(
            state.enter(now + Duration::from_secs(10), &options()),
            Enter::Rejected {
                state: CircuitState::Open,
                retry_after: Duration::from_secs(20)
            }
        );
        assert_eq!(state.snapshot().state, CircuitState::Open);
    }

    #[test]
    fn reset_timeout_moves_to_half_open_lazily() {
        let now = Instant::now();
        let mut state = opened(now);

        assert_eq!(state.enter(now + RESET, &options()), Enter::HalfOpened);
        assert_eq!(state.snapshot().state, CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_admits_one_trial_at_a_time() {
        let now = Instant::now();
        let mut state = opened(now);
        let later = now + RESET;

        assert_eq!(state.enter(later, &options()), Enter::HalfOpened);
        assert_eq!(
            state.enter(later, &options()),
            Enter::Rejected {
                state: CircuitState::HalfOpen,
                retry_after: Duration::ZERO
            }
        );

        assert_eq!(state.exit(Outcome::Success, true, later, &options()), Exit::Unchanged);
        assert_eq!(state.enter(later, &options()), Enter::Trial);
        assert_eq!(state.exit(Outcome::Success, true, later, &options()), Exit::Closed);
    }

    #[test]
    fn abandoned_trial_frees_the_slot() {
        let now = Instant::now();
        let mut state = opened(now);
        let later = now + RESET;

        assert_eq!(state.enter(later, &options()), Enter::HalfOpened);
        state.abandon_trial();

        assert_eq!(state.enter(later, &options()), Enter::Trial);
        assert_eq!(state.snapshot().trial_success_count, 0);
    }

    #[test]
    fn non_trial_results_are_ignored_while_half_open() {
        let now = Instant::now();
        let mut state = opened(now);
        let later = now + RESET;
        state.enter(later, &options());

        assert_eq!(state.exit(Outcome::Failure, false, later, &options()), Exit::Unchanged);
        assert_eq!(state.exit(Outcome::Success, false, later, &options()), Exit::Unchanged);
        assert_eq!(state.snapshot().state, CircuitState::HalfOpen);
        assert_eq!(state.snapshot().trial_success_count, 0);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let now = Instant::now();
        let mut state = opened(now);
        let later = now + RESET;
        state.enter(later, &options());

        assert_eq!(state.exit(Outcome::Success, true, later, &options()), Exit::Unchanged);
        assert_eq!(state.snapshot().trial_success_count, 1);
        state.enter(later, &options());
        assert_eq!(state.exit(Outcome::Success, true, later, &options()), Exit::Closed);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.trial_success_count, 0);
    }

    #[test]
    fn half_open_failure_reopens_and_restarts_timeout() {
        let now = Instant::now();
        let mut state = opened(now);
        let later = now + RESET;
        state.enter(later, &options());
        state.exit(Outcome::Success, true, later, &options());
        state.enter(later, &options());

        assert_eq!(state.exit(Outcome::Failure, true, later, &options()), Exit::Reopened);
        assert_eq!(state.snapshot().state, CircuitState::Open);
        assert_eq!(state.snapshot().last_failure_at, Some(later));
        assert_eq!(state.snapshot().trial_success_count, 0);
        assert!(matches!(
            state.enter(later + Duration::from_secs(1), &options()),
            Enter::Rejected { .. }
        ));
    }

    #[test]
    fn results_arriving_while_open_are_ignored() {
        let now = Instant::now();
        let mut state = opened(now);

        assert_eq!(state.exit(Outcome::Success, false, now, &options()), Exit::Unchanged);
        assert_eq!(state.exit(Outcome::Failure, false, now, &options()), Exit::Unchanged);
        assert_eq!(state.snapshot().state, CircuitState::Open);
        assert_eq!(state.snapshot().failure_count, 3);
    }

    #[test]
    fn state_names() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::Open.to_string(), "open");
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
    }
}
