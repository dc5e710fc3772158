// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// Builds a cache key by joining `parts` with `:`.
///
/// Keys identify the logical query, so every input that changes the result belongs in the key.
///
/// # Examples
///
/// ```
/// use innkeep_store::cache_key;
///
/// assert_eq!(cache_key(["listing", "42"]), "listing:42");
///
/// let listing_id = 42;
/// assert_eq!(
///     cache_key(["availability", &listing_id.to_string(), "2026-07-01"]),
///     "availability:42:2026-07-01"
/// );
/// ```
pub fn cache_key<I>(parts: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut key = String::new();

    for (index, part) in parts.into_iter().enumerate() {
        if index > 0 {
            key.push(':');
        }
        key.push_str(&part.to_string());
    }

    key
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_parts() {
        assert_eq!(cache_key(["listings", "beach"]), "listings:beach");
        assert_eq!(cache_key([7_u64]), "7");
        assert_eq!(cache_key(Vec::<String>::new()), "");
    }
}
