// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use innkeep_resilience::{Recovery, RecoveryInfo, is_transient};

/// Message fragments of connection-level failures reported by the remote store client.
const CONNECTION_SIGNATURES: &[&str] = &[
    "econnrefused",
    "connection refused",
    "econnreset",
    "connection reset",
    "epipe",
    "broken pipe",
    "network",
    "fetch failed",
    "socket hang up",
];

/// Message fragments of timeouts.
const TIMEOUT_SIGNATURES: &[&str] = &["timeout", "timed out"];

/// Message fragments of "no matching row" replies.
const NOT_FOUND_SIGNATURES: &[&str] = &["pgrst116", "no rows"];

/// Failure reported by the remote store.
///
/// Connection failures and timeouts are transient: they are retried and count against the
/// store's circuit breaker. [`StoreError::Unavailable`] is transient too and may carry a
/// server-provided retry delay. Every other variant is permanent.
///
/// # Examples
///
/// ```
/// use innkeep_store::StoreError;
///
/// assert!(StoreError::from_message("fetch failed").is_transient());
/// assert!(matches!(
///     StoreError::from_message("PGRST116: The result contains 0 rows, no rows returned"),
///     StoreError::NotFound(_)
/// ));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The connection could not be established or was lost.
    #[error("remote store connection failed: {0}")]
    Connection(String),

    /// The request did not complete in time.
    #[error("remote store request timed out: {0}")]
    Timeout(String),

    /// The store is overloaded or in maintenance.
    #[error("remote store unavailable: {message}")]
    Unavailable {
        /// Description from the store.
        message: String,
        /// How long the store asked callers to wait, if it said.
        retry_after: Option<Duration>,
    },

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was rejected as invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The write conflicts with existing data, for example overlapping bookings.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The reply did not follow the expected shape.
    #[error("malformed reply: {0}")]
    Protocol(String),

    /// Anything else the store reported.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Classifies an error message received in-band from the store client.
    ///
    /// Matching is case-insensitive and based on well-known fragments: timeouts, connection
    /// failures and "no rows" replies. Messages that match nothing become
    /// [`StoreError::Other`], which is permanent. Prefer constructing a specific variant
    /// wherever the client reports structured errors.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        let matches = |signatures: &[&str]| signatures.iter().any(|s| lowered.contains(s));

        if matches(NOT_FOUND_SIGNATURES) {
            Self::NotFound(message)
        } else if matches(TIMEOUT_SIGNATURES) {
            Self::Timeout(message)
        } else if matches(CONNECTION_SIGNATURES) {
            Self::Connection(message)
        } else {
            Self::Other(message)
        }
    }

    /// Returns `true` if retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        is_transient(&self.recovery())
    }
}

impl Recovery for StoreError {
    fn recovery(&self) -> RecoveryInfo {
        match self {
            Self::Connection(_) | Self::Timeout(_) => RecoveryInfo::retry(),
            Self::Unavailable {
                retry_after: Some(delay), ..
            } => RecoveryInfo::unavailable().delay(*delay),
            Self::Unavailable { retry_after: None, .. } => RecoveryInfo::unavailable(),
            Self::NotFound(_) | Self::Validation(_) | Self::Conflict(_) | Self::Protocol(_) | Self::Other(_) => RecoveryInfo::never(),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use innkeep_resilience::RecoveryKind;
    use rstest::rstest;

    use super::*;

    static_assertions::assert_impl_all!(StoreError: Send, Sync, Clone, std::error::Error);

    #[rstest]
    #[case("Request timeout after 10000ms")]
    #[case("operation timed out")]
    fn timeouts(#[case] message: &str) {
        assert_eq!(StoreError::from_message(message), StoreError::Timeout(message.to_string()));
    }

    #[rstest]
    #[case("connect ECONNREFUSED 127.0.0.1:5432")]
    #[case("Connection refused")]
    #[case("read ECONNRESET")]
    #[case("connection reset by peer")]
    #[case("write EPIPE")]
    #[case("Broken pipe")]
    #[case("NetworkError when attempting to fetch resource")]
    #[case("TypeError: fetch failed")]
    #[case("socket hang up")]
    fn connection_failures(#[case] message: &str) {
        let error = StoreError::from_message(message);

        assert_eq!(error, StoreError::Connection(message.to_string()));
        assert!(error.is_transient());
    }

    #[rstest]
    #[case("PGRST116")]
    #[case("JSON object requested, multiple (or no) rows returned: no rows")]
    fn not_found(#[case] message: &str) {
        let error = StoreError::from_message(message);

        assert!(matches!(error, StoreError::NotFound(_)));
        assert!(!error.is_transient());
    }

    #[test]
    fn unknown_messages_are_permanent() {
        let error = StoreError::from_message("duplicate key value violates unique constraint");

        assert_eq!(error.recovery().kind(), RecoveryKind::Never);
        assert_eq!(error.to_string(), "duplicate key value violates unique constraint");
    }

    #[test]
    fn unavailable_carries_delay_hint() {
        let error = StoreError::Unavailable {
            message: "maintenance".into(),
            retry_after: Some(Duration::from_secs(5)),
        };

        assert_eq!(error.recovery().kind(), RecoveryKind::Unavailable);
        assert_eq!(error.recovery().get_delay(), Some(Duration::from_secs(5)));
        assert!(error.is_transient());
    }

    #[test]
    fn structured_variants_classify() {
        assert!(StoreError::Timeout("t".into()).is_transient());
        assert!(!StoreError::Validation("guests must be positive".into()).is_transient());
        assert!(!StoreError::Conflict("dates overlap".into()).is_transient());
        assert!(!StoreError::Protocol("bad".into()).is_transient());
    }
}
