// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-memory key/value cache where each entry carries its own time-to-live.
//!
//! [`TtlCache`] serves two kinds of reads. A *fresh* read returns an entry only while its TTL
//! has not elapsed. A *stale* read ignores the TTL entirely and returns whatever was stored
//! last, so callers can fall back to last-known-good data while a remote dependency is down.
//!
//! Entries are never expired proactively. [`TtlCache::prune`] removes expired entries when the
//! host decides to reclaim memory; until then they remain visible to stale reads.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use innkeep_cache::{Freshness, TtlCache};
//! use tick::Clock;
//!
//! let cache = TtlCache::new(Clock::new_frozen());
//! cache.insert("season:2025".to_string(), 189_u32, Duration::from_secs(600));
//!
//! assert_eq!(cache.get("season:2025"), Some(189));
//! assert_eq!(cache.lookup("season:2025", Freshness::AllowStale), Some(189));
//! assert!(cache.get("season:2026").is_none());
//! ```
//!
//! # Time
//!
//! All timestamps come from the [`tick::Clock`] passed to [`TtlCache::new`]. In tests, drive
//! expiry with `tick::ClockControl` instead of sleeping.

mod cache;
mod entry;

pub use cache::{Freshness, TtlCache};
