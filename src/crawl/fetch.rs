// src/crawl/fetch.rs
// =============================================================================
// Issues exactly one HTTP request per call and returns the raw body.
//
// What counts as a failure:
// - transport errors (DNS, connect, TLS, timeout) and unreadable bodies
// - non-2xx responses, but only under StatusPolicy::Reject
//
// No retries happen here.
// =============================================================================

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, Method, StatusCode};
use tracing::debug;
use url::Url;

use crate::error::{Result, WeepError};

/// How non-2xx responses are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Any response is fetched-and-matchable, whatever its status
    #[default]
    Accept,
    /// Non-2xx responses are failures
    Reject,
}

/// A fetched page
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    method: Method,
    status_policy: StatusPolicy,
}

impl Fetcher {
    pub fn new(method: Method, timeout: Duration, status_policy: StatusPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WeepError::Config(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            client,
            method,
            status_policy,
        })
    }

    // Fetches `url` with the configured method
    //
    // Returns: the page with its full body, or a Fetch/Status error carrying
    // the URL.
    pub async fn fetch(&self, url: &Url) -> Result<Page> {
        debug!(%url, method = %self.method, "fetching");

        let response = self
            .client
            .request(self.method.clone(), url.clone())
            .send()
            .await
            .map_err(|source| WeepError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if self.status_policy == StatusPolicy::Reject && !status.is_success() {
            return Err(WeepError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|source| WeepError::Fetch {
            url: url.to_string(),
            source,
        })?;

        debug!(%url, %status, bytes = body.len(), "fetched");
        Ok(Page {
            url: url.clone(),
            status,
            body,
        })
    }
}
