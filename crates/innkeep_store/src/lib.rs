// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Resilient access to the remote store behind a vacation-rental booking site.
//!
//! Every read and write goes through a [`ResilientExecutor`], which combines an in-memory
//! TTL cache, retries with exponential backoff and jitter, and one circuit breaker per
//! dependency:
//!
//! ```text
//! query ─► fresh cache hit? ─yes─► value (from cache)
//!              │ no
//!              ▼
//!         circuit breaker ─open─────────────┐
//!              │ closed / half-open         │
//!              ▼                            ▼
//!         retry(operation) ─failed─► stale cache hit? ─yes─► value (from cache)
//!              │ ok                         │ no
//!              ▼                            ▼
//!         write-through cache ─► value    error
//! ```
//!
//! Listings and availability are read with a cache TTL so that a struggling store degrades to
//! slightly stale data instead of errors. Bookings and other writes use
//! [`QueryOptions::write`]: they are never cached and never rejected by the breaker.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use innkeep_store::{QueryOptions, ResilientExecutor, StoreError, StoreReply, cache_key};
//! use tick::ClockControl;
//!
//! # futures::executor::block_on(async {
//! let control = ClockControl::new().auto_advance_timers(true);
//! let executor = ResilientExecutor::builder(control.to_clock()).name("availability").build();
//! let options = QueryOptions::cached(Duration::from_secs(2));
//! let key = cache_key(["availability", "cottage", "2026-07"]);
//!
//! let live = executor
//!     .query_reply(&key, &options, || async { StoreReply::ok(vec![1_u8, 2, 3]) })
//!     .await;
//! assert_eq!(live.value(), Some(&Some(vec![1, 2, 3])));
//!
//! control.advance(Duration::from_secs(3));
//!
//! // The store is down and retries are exhausted; the expired entry is served instead.
//! let stale = executor
//!     .query_reply(&key, &options, || async { StoreReply::<Vec<u8>>::err("fetch failed") })
//!     .await;
//! assert!(stale.from_cache());
//! assert!(stale.error().is_none());
//! # });
//! ```
//!
//! # Errors
//!
//! A failed query yields a [`QueryError`]: either [`QueryError::CircuitOpen`], which tells the
//! caller how many seconds to wait, or [`QueryError::Operation`] with the operation's own error.
//! Errors of the store are modeled by [`StoreError`], which classifies connection failures and
//! timeouts as transient and everything else as permanent.
//!
//! # Features
//!
//! - `metrics`: reports retries and breaker transitions through OpenTelemetry, see
//!   `ResilientExecutorBuilder::enable_metrics`.

mod config;
mod error;
mod executor;
mod key;
mod options;
mod output;
mod reply;

pub use config::{BreakerConfig, DEFAULT_DEPENDENCY, DEFAULT_PIPELINE_NAME, RetryConfig, StoreConfig};
pub use error::StoreError;
pub use executor::{ResilientExecutor, ResilientExecutorBuilder};
pub use innkeep_resilience::breaker::{BreakerOptions, BreakerSnapshot, CircuitOpenError, CircuitState, DependencyId};
pub use key::cache_key;
pub use options::{DEFAULT_CACHE_TTL, QueryOptions};
pub use output::{QueryError, QueryOutput, QuerySource};
pub use reply::StoreReply;
