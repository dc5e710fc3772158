// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BreakerOptions, BreakerSnapshot, CircuitBreaker, DependencyId};
use crate::ResilienceContext;

/// Hands out one shared [`CircuitBreaker`] per dependency, creating breakers on first use.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use innkeep_resilience::ResilienceContext;
/// use innkeep_resilience::breaker::{BreakerOptions, BreakerRegistry};
/// use tick::Clock;
///
/// let registry = BreakerRegistry::new(BreakerOptions::default(), &ResilienceContext::new(Clock::new_frozen()));
///
/// let first = registry.get("remote_store");
/// let second = registry.get("remote_store");
/// assert!(Arc::ptr_eq(&first, &second));
/// assert!(!Arc::ptr_eq(&first, &registry.get("payments")));
/// ```
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<DependencyId, Arc<CircuitBreaker>>>,
    default_options: BreakerOptions,
    context: ResilienceContext,
}

impl BreakerRegistry {
    /// Creates an empty registry. New breakers use `default_options`.
    #[must_use]
    pub fn new(default_options: BreakerOptions, context: &ResilienceContext) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            default_options,
            context: context.clone(),
        }
    }

    /// Returns the breaker for `dependency`, creating it with the default options if needed.
    pub fn get(&self, dependency: impl Into<DependencyId>) -> Arc<CircuitBreaker> {
        let dependency = dependency.into();
        let mut breakers = self.breakers.lock();

        if let Some(breaker) = breakers.get(&dependency) {
            return Arc::clone(breaker);
        }

        let breaker = Arc::new(CircuitBreaker::new(dependency.clone(), self.default_options, &self.context));
        breakers.insert(dependency, Arc::clone(&breaker));
        breaker
    }

    /// Returns the breaker for `dependency` only if it already exists.
    #[must_use]
    pub fn find(&self, dependency: &DependencyId) -> Option<Arc<CircuitBreaker>> {
        self.breakers.lock().get(dependency).map(Arc::clone)
    }

    /// Registers a breaker with its own options. An existing breaker for the same dependency
    /// is kept as is and returned instead.
    pub fn register(&self, dependency: impl Into<DependencyId>, options: BreakerOptions) -> Arc<CircuitBreaker> {
        let dependency = dependency.into();
        let mut breakers = self.breakers.lock();

        Arc::clone(
            breakers
                .entry(dependency.clone())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(dependency, options, &self.context))),
        )
    }

    /// Snapshots of every breaker created so far.
    #[must_use]
    pub fn snapshots(&self) -> Vec<(DependencyId, BreakerSnapshot)> {
        let breakers: Vec<_> = self.breakers.lock().values().map(Arc::clone).collect();

        breakers
            .iter()
            .map(|breaker| (breaker.dependency().clone(), breaker.snapshot()))
            .collect()
    }

    /// Number of breakers created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.lock().len()
    }

    /// Returns `true` if no breaker has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.lock().is_empty()
    }
}
