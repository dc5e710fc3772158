// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use innkeep_resilience::breaker::DependencyId;

/// Cache lifetime used by [`QueryOptions::default`].
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Per-call settings of [`ResilientExecutor::query`][crate::ResilientExecutor::query].
///
/// A zero cache TTL disables the cache for the call: nothing is read from it, nothing is written
/// to it, and failures never fall back to stale entries. Writes should use
/// [`QueryOptions::write`], which also bypasses the circuit breaker so a booking attempt is never
/// rejected by the health of unrelated reads.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use innkeep_store::QueryOptions;
///
/// let listing = QueryOptions::cached(Duration::from_secs(300)).max_retries(1);
/// assert_eq!(listing.get_cache_ttl(), Duration::from_secs(300));
/// assert_eq!(listing.get_max_retries(), Some(1));
///
/// let booking = QueryOptions::write();
/// assert!(!booking.get_use_circuit_breaker());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    cache_ttl: Duration,
    max_retries: Option<u32>,
    use_circuit_breaker: bool,
    dependency: Option<DependencyId>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::cached(DEFAULT_CACHE_TTL)
    }
}

impl QueryOptions {
    /// Caches successful results for `ttl`, with retries and the circuit breaker enabled.
    #[must_use]
    pub fn cached(ttl: Duration) -> Self {
        Self {
            cache_ttl: ttl,
            max_retries: None,
            use_circuit_breaker: true,
            dependency: None,
        }
    }

    /// A read that always goes to the store, with retries and the circuit breaker enabled.
    #[must_use]
    pub fn uncached() -> Self {
        Self::cached(Duration::ZERO)
    }

    /// A mutation: uncached and not guarded by the circuit breaker. Retries stay enabled.
    #[must_use]
    pub fn write() -> Self {
        Self::uncached().use_circuit_breaker(false)
    }

    /// How long successful results stay fresh. Zero disables the cache for the call.
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Overrides the executor's retry count for this call. Zero disables retrying.
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Enables or disables the circuit breaker for the call.
    #[must_use]
    pub fn use_circuit_breaker(mut self, enabled: bool) -> Self {
        self.use_circuit_breaker = enabled;
        self
    }

    /// Routes the call through the breaker of `dependency` instead of the executor's default.
    #[must_use]
    pub fn dependency(mut self, dependency: impl Into<DependencyId>) -> Self {
        self.dependency = Some(dependency.into());
        self
    }

    /// The cache lifetime of successful results.
    #[must_use]
    pub fn get_cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// The retry override, or `None` to use the executor's policy.
    #[must_use]
    pub fn get_max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Whether the call is guarded by the circuit breaker.
    #[must_use]
    pub fn get_use_circuit_breaker(&self) -> bool {
        self.use_circuit_breaker
    }

    /// The dependency override, or `None` to use the executor's default dependency.
    #[must_use]
    pub fn get_dependency(&self) -> Option<&DependencyId> {
        self.dependency.as_ref()
    }

    pub(crate) fn caches(&self) -> bool {
        !self.cache_ttl.is_zero()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = QueryOptions::default();

        assert_eq!(options.get_cache_ttl(), DEFAULT_CACHE_TTL);
        assert_eq!(options.get_max_retries(), None);
        assert!(options.get_use_circuit_breaker());
        assert!(options.get_dependency().is_none());
        assert!(options.caches());
    }

    #[test]
    fn uncached_and_write() {
        assert!(!QueryOptions::uncached().caches());
        assert!(QueryOptions::uncached().get_use_circuit_breaker());

        let write = QueryOptions::write();
        assert!(!write.caches());
        assert!(!write.get_use_circuit_breaker());
        assert_eq!(write.get_max_retries(), None);
    }

    #[test]
    fn dependency_override() {
        let options = QueryOptions::uncached().dependency("payments");

        assert_eq!(options.get_dependency(), Some(&DependencyId::from("payments")));
    }
}
