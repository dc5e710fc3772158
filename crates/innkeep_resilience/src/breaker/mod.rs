// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Circuit breakers that stop calling a dependency while it keeps failing.
//!
//! A [`CircuitBreaker`] guards one dependency and moves between [`CircuitState::Closed`],
//! [`CircuitState::Open`] and [`CircuitState::HalfOpen`]. Transitions are evaluated when calls
//! arrive; there are no background timers. Use a [`BreakerRegistry`] to share one breaker per
//! [`DependencyId`] across an application.

mod circuit_breaker;
mod dependency_id;
mod error;
mod options;
mod registry;
mod state;

pub use circuit_breaker::CircuitBreaker;
pub use dependency_id::DependencyId;
pub use error::{BreakerError, CircuitOpenError};
pub use options::{BreakerOptions, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT, DEFAULT_SUCCESS_THRESHOLD};
pub use registry::BreakerRegistry;
pub use state::{BreakerSnapshot, CircuitState};
