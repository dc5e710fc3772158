// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::DependencyId;
use crate::{Recovery, RecoveryInfo};

/// A call was rejected because the dependency's circuit breaker is open.
///
/// The dependency was not contacted. [`retry_after`][Self::retry_after] tells how long until the
/// breaker lets a trial call through.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker for '{dependency}' is open, retry after {}s", ceil_secs(.retry_after))]
pub struct CircuitOpenError {
    dependency: DependencyId,
    retry_after: Duration,
}

impl CircuitOpenError {
    pub(crate) fn new(dependency: DependencyId, retry_after: Duration) -> Self {
        Self {
            dependency,
            retry_after,
        }
    }

    /// The dependency whose breaker rejected the call.
    #[must_use]
    pub fn dependency(&self) -> &DependencyId {
        &self.dependency
    }

    /// Time until the breaker allows a trial call.
    #[must_use]
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    /// [`retry_after`][Self::retry_after] rounded up to whole seconds, for "try again in N
    /// seconds" messages.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        ceil_secs(&self.retry_after)
    }
}

impl Recovery for CircuitOpenError {
    fn recovery(&self) -> RecoveryInfo {
        RecoveryInfo::unavailable().delay(self.retry_after)
    }
}

/// Error returned by [`CircuitBreaker::execute`][super::CircuitBreaker::execute].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The breaker is open and the operation was not invoked.
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns `true` if the call was rejected by an open breaker.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// The operation's error, if the operation ran.
    #[must_use]
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Open(_) => None,
            Self::Inner(error) => Some(error),
        }
    }
}

impl<E: Recovery> Recovery for BreakerError<E> {
    fn recovery(&self) -> RecoveryInfo {
        match self {
            Self::Open(open) => open.recovery(),
            Self::Inner(error) => error.recovery(),
        }
    }
}

fn ceil_secs(duration: &Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecoveryKind;

    fn open(millis: u64) -> CircuitOpenError {
        CircuitOpenError::new("remote_store".into(), Duration::from_millis(millis))
    }

    #[test]
    fn retry_after_secs_rounds_up() {
        assert_eq!(open(0).retry_after_secs(), 0);
        assert_eq!(open(1).retry_after_secs(), 1);
        assert_eq!(open(1000).retry_after_secs(), 1);
        assert_eq!(open(29_001).retry_after_secs(), 30);
    }

    #[test]
    fn display_mentions_dependency_and_seconds() {
        assert_eq!(
            open(1500).to_string(),
            "circuit breaker for 'remote_store' is open, retry after 2s"
        );
    }

    #[test]
    fn open_error_is_unavailable_with_delay() {
        let recovery = open(1500).recovery();

        assert_eq!(recovery.kind(), RecoveryKind::Unavailable);
        assert_eq!(recovery.get_delay(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn breaker_error_accessors() {
        let rejected: BreakerError<std::io::Error> = open(10).into();
        assert!(rejected.is_open());
        assert!(rejected.into_inner().is_none());

        let inner = BreakerError::Inner(std::io::Error::other("boom"));
        assert!(!inner.is_open());
        assert_eq!(inner.to_string(), "boom");
        assert_eq!(inner.into_inner().map(|e| e.to_string()), Some("boom".to_string()));
    }
}
