// src/error.rs
// =============================================================================
// Error taxonomy for a crawl run.
//
// Two families:
// - Per-URL failures (InvalidUrl, Fetch, Status, Cancelled, Parse): reported
//   once to the error sink, the URL's task completes as failed, the crawl
//   keeps going.
// - Configuration failures (Regex, Selector, Config): fatal at startup, before
//   any request is made.
//
// The Display text of per-URL variants is the cause only; the aggregator
// prints it as "failure: <cause>, url: '<url>'".
// =============================================================================

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeepError {
    /// A seed or discovered reference that is not a usable absolute URL
    #[error("invalid url: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Transport error or unreadable body
    #[error("{source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response while the status policy rejects them
    #[error("HTTP {status}")]
    Status { url: String, status: StatusCode },

    /// The run was cancelled while this URL waited for a token or its response
    #[error("cancelled")]
    Cancelled { url: String },

    /// The fetched page could not be parsed for links or selectors
    #[error("parse error: {reason}")]
    Parse { url: String, reason: String },

    #[error("invalid regular expression '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid selector '{pattern}': {reason}")]
    Selector { pattern: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl WeepError {
    /// The URL a per-URL failure is attributed to
    pub fn url(&self) -> Option<&str> {
        match self {
            WeepError::InvalidUrl { url, .. }
            | WeepError::Fetch { url, .. }
            | WeepError::Status { url, .. }
            | WeepError::Cancelled { url }
            | WeepError::Parse { url, .. } => Some(url),
            WeepError::Regex { .. } | WeepError::Selector { .. } | WeepError::Config(_) => None,
        }
    }

    /// Configuration errors abort the run; everything else is local to one URL
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WeepError::Regex { .. } | WeepError::Selector { .. } | WeepError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WeepError>;
