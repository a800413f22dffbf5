// src/crawl/mod.rs
// =============================================================================
// This module handles crawling.
//
// Submodules:
// - pool: the worker pool driving a whole run
// - fetch: one HTTP request per URL
// - links: link discovery with the domain policy
// - visited: URL deduplication
// - tracker: outstanding-work counter and completion signal
// - limiter: token-bucket request rate limiting
// =============================================================================

mod fetch;
mod limiter;
mod links;
mod pool;
mod tracker;
mod visited;

pub use fetch::StatusPolicy;
pub use limiter::RateLimit;
pub use pool::{CrawlEvent, Crawler};
