// src/crawl/visited.rs
// =============================================================================
// The visited set: the one place that decides whether a URL gets fetched.
//
// Link extraction may hand out the same URL many times (cycles, duplicates,
// different query strings). Every worker asks try_claim() before fetching and
// only the first caller for a normalized URL gets `true`.
//
// Normalization: query string and fragment are dropped, then a trailing
// slash is removed, so "http://x/a/?q=1#f" and "http://x/a" share one key.
// =============================================================================

use dashmap::DashSet;
use url::Url;

#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: DashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    // Atomically marks `url` as owned by the caller
    //
    // Returns true only to the caller that inserted the key; every other
    // caller, concurrent or later, gets false and must not fetch.
    pub fn try_claim(&self, url: &Url) -> bool {
        self.seen.insert(normalize(url))
    }

    /// Whether the URL was already claimed (a hint; try_claim decides)
    pub fn contains(&self, url: &Url) -> bool {
        self.seen.contains(&normalize(url))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Visited-set key for a URL
pub fn normalize(url: &Url) -> String {
    let mut key = url.clone();
    key.set_query(None);
    key.set_fragment(None);

    let mut key = String::from(key);
    if key.ends_with('/') {
        key.pop();
    }
    key
}
