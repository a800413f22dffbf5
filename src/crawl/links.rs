// src/crawl/links.rs
// =============================================================================
// Finds the pages to crawl next.
//
// How it works:
// 1. Parse the body as HTML
// 2. Walk every node depth-first and read `href`, then `src`, of each element
// 3. Resolve each value against the page URL (relative links become absolute)
// 4. Keep http/https links whose host is the page's own host or allow-listed
//
// Duplicates and cycles are returned as-is; the visited set filters them.
// =============================================================================

use std::collections::HashSet;

use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

use crate::error::{Result, WeepError};

const LINK_ATTRIBUTES: [&str; 2] = ["href", "src"];

// Extracts crawlable links from a page
//
// Parameters:
//   body: the page content
//   source: the URL the page was fetched from (base for relative links)
//   allowed_domains: extra hostnames links may point to
//
// Returns: absolute URLs in document order, or a Parse error if `source`
// cannot act as a base URL
pub fn extract_links(body: &str, source: &Url, allowed_domains: &HashSet<String>) -> Result<Vec<Url>> {
    if source.cannot_be_a_base() {
        return Err(WeepError::Parse {
            url: source.to_string(),
            reason: "page URL cannot be used to resolve links".to_string(),
        });
    }

    let document = Html::parse_document(body);
    let mut links = Vec::new();

    for node in document.tree.root().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };

        for attribute in LINK_ATTRIBUTES {
            let Some(reference) = element.value().attr(attribute) else {
                continue;
            };

            let link = match source.join(reference.trim()) {
                Ok(link) => link,
                Err(e) => {
                    debug!(%source, reference, error = %e, "skipping malformed link");
                    continue;
                }
            };

            if is_crawlable(&link, source, allowed_domains) {
                links.push(link);
            }
        }
    }

    Ok(links)
}

// Domain policy: same host as the page, or explicitly allowed
fn is_crawlable(link: &Url, source: &Url, allowed_domains: &HashSet<String>) -> bool {
    if link.scheme() != "http" && link.scheme() != "https" {
        return false;
    }

    match link.host_str() {
        Some(host) => source.host_str() == Some(host) || allowed_domains.contains(host),
        None => false,
    }
}
