// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Retry with backoff and circuit breaking for calls into an unreliable remote store.
//!
//! - [`retry::RetryPolicy`] re-runs an operation while it fails with transient errors, sleeping
//!   with exponential backoff and jitter between attempts.
//! - [`breaker::CircuitBreaker`] rejects calls to a dependency that keeps failing and probes it
//!   again after a cool-down. [`breaker::BreakerRegistry`] keeps one breaker per dependency.
//!
//! # Error classification
//!
//! Both primitives decide what to do with a failure by asking for its [`RecoveryInfo`], through
//! the [`Recovery`] trait or an explicit classifier closure. [`RecoveryKind::Retry`] and
//! [`RecoveryKind::Unavailable`] are transient: they are retried and count against a
//! dependency's health. Every other kind is permanent: it is returned at once and leaves the
//! breaker untouched.
//!
//! ```
//! use innkeep_resilience::{Recovery, RecoveryInfo, is_transient};
//!
//! #[derive(Debug)]
//! enum BookingError {
//!     Timeout,
//!     DatesUnavailable,
//! }
//!
//! impl Recovery for BookingError {
//!     fn recovery(&self) -> RecoveryInfo {
//!         match self {
//!             Self::Timeout => RecoveryInfo::retry(),
//!             Self::DatesUnavailable => RecoveryInfo::never(),
//!         }
//!     }
//! }
//!
//! assert!(is_transient(&BookingError::Timeout.recovery()));
//! assert!(!is_transient(&BookingError::DatesUnavailable.recovery()));
//! ```
//!
//! # Telemetry
//!
//! Retries and breaker transitions emit `tracing` events named `innkeep.retry` and
//! `innkeep.circuit_breaker.*`. With the `metrics` feature, [`ResilienceContext::enable_metrics`]
//! also reports each of them on the `resilience.event` OpenTelemetry counter.

mod context;
#[cfg(any(feature = "metrics", test))]
mod metrics;
mod rnd;
mod telemetry;

pub mod breaker;
pub mod retry;

pub use context::ResilienceContext;
pub use recoverable::{Recovery, RecoveryInfo, RecoveryKind};

/// Returns `true` for failures worth retrying: [`RecoveryKind::Retry`] and
/// [`RecoveryKind::Unavailable`].
#[must_use]
pub fn is_transient(recovery: &RecoveryInfo) -> bool {
    match recovery.kind() {
        RecoveryKind::Retry | RecoveryKind::Unavailable => true,
        _ => false,
    }
}
