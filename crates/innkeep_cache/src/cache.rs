// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::RwLock;
use tick::Clock;

use crate::entry::CacheEntry;

/// Selects which entries a read may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Only entries whose TTL has not elapsed.
    #[default]
    Fresh,

    /// Any stored entry, regardless of age.
    AllowStale,
}

/// An in-memory cache where every entry has its own time-to-live.
///
/// Writes always overwrite and reset the entry's timestamp. Expired entries stay in the cache,
/// readable through [`get_stale`][Self::get_stale], until [`prune`][Self::prune] or
/// [`clear`][Self::clear] removes them.
///
/// The cache is safe to share between tasks. Every operation is synchronous and holds the
/// internal lock only for the duration of the call.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use innkeep_cache::TtlCache;
/// use tick::ClockControl;
///
/// let control = ClockControl::new();
/// let cache = TtlCache::new(control.to_clock());
///
/// cache.insert("availability:cottage", vec!["2025-07-01"], Duration::from_secs(30));
/// control.advance(Duration::from_secs(31));
///
/// assert!(cache.get("availability:cottage").is_none());
/// assert_eq!(cache.get_stale("availability:cottage"), Some(vec!["2025-07-01"]));
/// ```
pub struct TtlCache<K, V> {
    clock: Clock,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates an empty cache that reads time from `clock`.
    #[must_use]
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the value for `key` if it is present and fresh.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, Freshness::Fresh)
    }

    /// Returns the value for `key` if it is present, no matter how old it is.
    ///
    /// Use this only as a fallback when the source of truth cannot be reached.
    #[must_use]
    pub fn get_stale<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, Freshness::AllowStale)
    }

    /// Returns the value for `key` subject to `freshness`.
    #[must_use]
    pub fn lookup<Q>(&self, key: &Q, freshness: Freshness) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.instant();
        let entries = self.entries.read();
        let entry = entries.get(key)?;

        match freshness {
            Freshness::Fresh if !entry.is_fresh(now) => None,
            _ => Some(entry.value().clone()),
        }
    }

    /// Returns `true` if `key` is present and fresh.
    #[must_use]
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.instant();
        self.entries.read().get(key).is_some_and(|entry| entry.is_fresh(now))
    }

    /// Stores `value` under `key`, replacing any previous entry and restarting its TTL.
    ///
    /// A zero `ttl` stores the value for stale reads only; fresh reads will miss.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry::new(value, self.clock.instant(), ttl);
        self.entries.write().insert(key, entry);
    }

    /// Removes `key`. Returns `true` if an entry was present.
    pub fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.write().remove(key).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Removes every entry whose TTL has elapsed and returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = self.clock.instant();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            tracing::event!(
                name: "innkeep.cache.pruned",
                tracing::Level::DEBUG,
                cache.pruned = removed,
            );
        }

        removed
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K, V> Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("len", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}
