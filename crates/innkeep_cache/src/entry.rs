// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

/// A stored value together with the moment it was written and how long it stays fresh.
#[derive(Clone, Debug)]
pub(crate) struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, stored_at: Instant, ttl: Duration) -> Self {
        Self { value, stored_at, ttl }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// An entry is fresh while `now - stored_at <= ttl`. A zero TTL is never fresh.
    pub fn is_fresh(&self, now: Instant) -> bool {
        !self.ttl.is_zero() && now.saturating_duration_since(self.stored_at) <= self.ttl
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_until_ttl_inclusive() {
        let now = Instant::now();
        let entry = CacheEntry::new("cottage", now, Duration::from_secs(5));

        assert!(entry.is_fresh(now));
        assert!(entry.is_fresh(now + Duration::from_secs(5)));
        assert!(!entry.is_fresh(now + Duration::from_millis(5001)));
        assert_eq!(*entry.value(), "cottage");
    }

    #[test]
    fn zero_ttl_is_never_fresh() {
        let now = Instant::now();
        let entry = CacheEntry::new(1, now, Duration::ZERO);

        assert!(!entry.is_fresh(now));
    }

    #[test]
    fn clock_going_backwards_counts_as_fresh() {
        let now = Instant::now();
        let entry = CacheEntry::new(1, now + Duration::from_secs(1), Duration::from_secs(1));

        assert!(entry.is_fresh(now));
    }
}
