// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use innkeep_resilience::breaker::{BreakerError, CircuitOpenError};
use innkeep_resilience::{Recovery, RecoveryInfo, is_transient};

/// Where the value of a successful query came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum QuerySource {
    /// The operation ran and returned the value.
    Live,

    /// A fresh cache entry; the operation did not run.
    Cache,

    /// An expired cache entry served because the operation failed transiently.
    StaleCache,
}

impl QuerySource {
    /// Returns `true` if the value was served from the cache, fresh or stale.
    #[must_use]
    pub fn is_cached(self) -> bool {
        matches!(self, Self::Cache | Self::StaleCache)
    }
}

/// Failure of [`ResilientExecutor::query`][crate::ResilientExecutor::query].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum QueryError<E> {
    /// The dependency's circuit breaker is open and the operation was not invoked.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// The operation failed. For transient errors this is the last failure after retries were
    /// exhausted.
    #[error(transparent)]
    Operation(E),
}

impl<E> QueryError<E> {
    /// Whole seconds until the breaker allows a trial call, for "try again in N seconds"
    /// messages. `None` unless the breaker rejected the call.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::CircuitOpen(open) => Some(open.retry_after_secs()),
            Self::Operation(_) => None,
        }
    }

    /// Returns `true` if the breaker rejected the call.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }

    /// The operation's error, if the operation ran.
    #[must_use]
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::CircuitOpen(_) => None,
            Self::Operation(error) => Some(error),
        }
    }
}

impl<E: Recovery> QueryError<E> {
    /// Returns `true` if the same query may succeed later. A breaker rejection is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        is_transient(&self.recovery())
    }
}

impl<E: Recovery> Recovery for QueryError<E> {
    fn recovery(&self) -> RecoveryInfo {
        match self {
            Self::CircuitOpen(open) => open.recovery(),
            Self::Operation(error) => error.recovery(),
        }
    }
}

impl<E> From<BreakerError<E>> for QueryError<E> {
    fn from(error: BreakerError<E>) -> Self {
        match error {
            BreakerError::Open(open) => Self::CircuitOpen(open),
            BreakerError::Inner(error) => Self::Operation(error),
        }
    }
}

/// Result of a query together with where its value came from.
///
/// Exactly one of [`value`][Self::value] and [`error`][Self::error] is present, and
/// [`from_cache`][Self::from_cache] is `false` whenever the query failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutput<T, E> {
    result: Result<T, QueryError<E>>,
    source: Option<QuerySource>,
}

impl<T, E> QueryOutput<T, E> {
    pub(crate) fn ok(value: T, source: QuerySource) -> Self {
        Self {
            result: Ok(value),
            source: Some(source),
        }
    }

    pub(crate) fn failed(error: QueryError<E>) -> Self {
        Self {
            result: Err(error),
            source: None,
        }
    }

    /// The value, if the query succeeded.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// The error, if the query failed.
    #[must_use]
    pub fn error(&self) -> Option<&QueryError<E>> {
        self.result.as_ref().err()
    }

    /// Returns `true` if the value was served from the cache, fresh or stale.
    #[must_use]
    pub fn from_cache(&self) -> bool {
        self.source.is_some_and(QuerySource::is_cached)
    }

    /// Where the value came from; `None` for failed queries.
    #[must_use]
    pub fn source(&self) -> Option<QuerySource> {
        self.source
    }

    /// Returns `true` if the query produced a value.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The value, discarding the error.
    pub fn into_value(self) -> Option<T> {
        self.result.ok()
    }

    /// Converts the output into a plain `Result`.
    ///
    /// # Errors
    ///
    /// Returns the query's error if it failed.
    pub fn into_result(self) -> Result<T, QueryError<E>> {
        self.result
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use innkeep_resilience::breaker::{BreakerOptions, CircuitBreaker};
    use innkeep_resilience::{RecoveryKind, ResilienceContext};
    use tick::Clock;

    use super::*;
    use crate::StoreError;

    static_assertions::assert_impl_all!(QueryError<StoreError>: Send, Sync, std::error::Error);
    static_assertions::assert_impl_all!(QueryOutput<String, StoreError>: Send, Sync);

    async fn open_error() -> CircuitOpenError {
        let context = ResilienceContext::new(Clock::new_frozen());
        let breaker = CircuitBreaker::new("remote_store", BreakerOptions::default().failure_threshold(1), &context);
        let _ = breaker
            .execute(|| async { Err::<(), _>(StoreError::Connection("refused".into())) })
            .await;

        match breaker.execute(|| async { Ok::<_, StoreError>(()) }).await {
            Err(BreakerError::Open(open)) => open,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn circuit_open_reports_retry_after() {
        let error: QueryError<StoreError> = futures::executor::block_on(open_error()).into();

        assert!(error.is_circuit_open());
        assert!(error.is_transient());
        assert_eq!(error.retry_after_secs(), Some(30));
        assert_eq!(error.recovery().kind(), RecoveryKind::Unavailable);
        assert!(error.operation_error().is_none());
        assert_eq!(
            error.to_string(),
            "circuit breaker for 'remote_store' is open, retry after 30s"
        );
    }

    #[test]
    fn operation_error_is_transparent() {
        let error = QueryError::from(BreakerError::Inner(StoreError::Validation("bad dates".into())));

        assert_eq!(error.to_string(), "validation failed: bad dates");
        assert_eq!(error.retry_after_secs(), None);
        assert!(!error.is_transient());
        assert_eq!(error.operation_error(), Some(&StoreError::Validation("bad dates".into())));
    }

    #[test]
    fn output_accessors() {
        let live = QueryOutput::<u32, StoreError>::ok(4, QuerySource::Live);
        assert_eq!(live.value(), Some(&4));
        assert!(live.error().is_none());
        assert!(!live.from_cache());
        assert!(live.is_ok());

        let stale = QueryOutput::<u32, StoreError>::ok(4, QuerySource::StaleCache);
        assert!(stale.from_cache());
        assert_eq!(stale.into_result(), Ok(4));

        let failed = QueryOutput::<u32, StoreError>::failed(QueryError::Operation(StoreError::Other("x".into())));
        assert!(failed.value().is_none());
        assert!(!failed.from_cache());
        assert_eq!(failed.source(), None);
        assert_eq!(failed.into_value(), None);
    }
}
