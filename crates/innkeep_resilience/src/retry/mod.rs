// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retry with exponential backoff and jitter.
//!
//! [`RetryPolicy`] re-runs an async operation while it fails with transient errors. See its
//! documentation for the exact schedule.

use std::time::Duration;

mod backoff;
mod policy;

pub use policy::{RetryAttempt, RetryPolicy};

/// Retries after the initial attempt, unless configured otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Cap on the base delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Growth factor of the base delay.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Jitter is on by default.
pub const DEFAULT_JITTER: bool = true;
