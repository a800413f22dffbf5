// src/config.rs
// =============================================================================
// Run configuration.
//
// SettingsBuilder collects raw options in any order; build() validates them
// and derives everything else (compiled patterns, rate limiter quota, HTTP
// method) in one step. The resulting Settings is immutable and shared by all
// workers through Arc<Settings>.
// =============================================================================

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Method;
use url::Url;

use crate::crawl::{RateLimit, StatusPolicy};
use crate::error::{Result, WeepError};
use crate::matcher::{Formatter, Matcher, OutputStyle, PatternMode};

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Validated, immutable settings for one crawl run
#[derive(Debug)]
pub struct Settings {
    pub matcher: Matcher,
    pub formatter: Formatter,
    /// Lower-cased hostnames links may point to besides the page's own host
    pub allowed_domains: HashSet<String>,
    /// Fetch only the seed pages, never follow links
    pub single_page: bool,
    pub concurrency: usize,
    /// Capacity of the shared work queue
    pub queue_capacity: usize,
    pub rate_limit: RateLimit,
    pub method: Method,
    pub timeout: Duration,
    pub status_policy: StatusPolicy,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    // Matches a page body and renders every result as an output line
    pub fn render_matches(&self, body: &str, url: &Url) -> Vec<String> {
        self.matcher
            .find_matches(body)
            .iter()
            .map(|unit| self.formatter.render(unit, url))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SettingsBuilder {
    patterns: Vec<String>,
    mode: PatternMode,
    ignore_case: bool,
    invert: bool,
    line_numbers: bool,
    source_url: bool,
    style: OutputStyle,
    single_page: bool,
    allowed_domains: Vec<String>,
    concurrency: usize,
    queue_capacity: Option<usize>,
    rate: f64,
    burst: u32,
    method: String,
    timeout: Duration,
    status_policy: StatusPolicy,
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            mode: PatternMode::default(),
            ignore_case: false,
            invert: false,
            line_numbers: false,
            source_url: false,
            style: OutputStyle::default(),
            single_page: false,
            allowed_domains: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            queue_capacity: None,
            rate: 0.0,
            burst: 1,
            method: "GET".to_string(),
            timeout: DEFAULT_TIMEOUT,
            status_policy: StatusPolicy::default(),
        }
    }
}

impl SettingsBuilder {
    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn mode(mut self, mode: PatternMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn ignore_case(mut self, yes: bool) -> Self {
        self.ignore_case = yes;
        self
    }

    pub fn invert(mut self, yes: bool) -> Self {
        self.invert = yes;
        self
    }

    pub fn line_numbers(mut self, yes: bool) -> Self {
        self.line_numbers = yes;
        self
    }

    pub fn source_url(mut self, yes: bool) -> Self {
        self.source_url = yes;
        self
    }

    pub fn style(mut self, style: OutputStyle) -> Self {
        self.style = style;
        self
    }

    pub fn single_page(mut self, yes: bool) -> Self {
        self.single_page = yes;
        self
    }

    pub fn allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_domains.extend(domains.into_iter().map(Into::into));
        self
    }

    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers;
        self
    }

    /// Defaults to the worker count; 0 makes every hand-off a rendezvous
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Requests per second, 0 for unlimited
    pub fn rate(mut self, requests_per_second: f64) -> Self {
        self.rate = requests_per_second;
        self
    }

    pub fn burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    // Validates the options and compiles the matcher
    //
    // Every error returned here is a configuration error and fatal.
    pub fn build(self) -> Result<Settings> {
        if self.concurrency == 0 {
            return Err(WeepError::Config("concurrency must be at least 1".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(WeepError::Config("timeout must be greater than zero".to_string()));
        }

        let method = Method::from_bytes(self.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| WeepError::Config(format!("invalid HTTP method '{}'", self.method)))?;

        let rate_limit = RateLimit::from_rate(self.rate, self.burst)?;
        let matcher = Matcher::new(&self.patterns, &self.mode, self.ignore_case, self.invert)?;

        let allowed_domains = self
            .allowed_domains
            .iter()
            .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        Ok(Settings {
            matcher,
            formatter: Formatter {
                style: self.style,
                line_numbers: self.line_numbers,
                source_url: self.source_url,
            },
            allowed_domains,
            single_page: self.single_page,
            concurrency: self.concurrency,
            queue_capacity: self.queue_capacity.unwrap_or(self.concurrency),
            rate_limit,
            method,
            timeout: self.timeout,
            status_policy: self.status_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::SelectorTarget;

    #[test]
    fn test_defaults() {
        let settings = Settings::builder().patterns(["foo"]).build().unwrap();
        assert_eq!(settings.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(settings.queue_capacity, DEFAULT_CONCURRENCY);
        assert_eq!(settings.method, Method::GET);
        assert_eq!(settings.rate_limit, RateLimit::Unlimited);
        assert_eq!(settings.status_policy, StatusPolicy::Accept);
        assert!(!settings.single_page);
    }

    #[test]
    fn test_option_order_does_not_matter() {
        // ignore_case given after the pattern still applies to it
        let settings = Settings::builder()
            .mode(PatternMode::Regex)
            .patterns(["^hello"])
            .ignore_case(true)
            .build()
            .unwrap();
        let url = Url::parse("http://a.com/").unwrap();
        assert_eq!(settings.render_matches("HELLO there\n", &url), vec!["HELLO there"]);
    }

    #[test]
    fn test_render_matches_applies_formatter() {
        let settings = Settings::builder()
            .patterns(["foo"])
            .line_numbers(true)
            .source_url(true)
            .build()
            .unwrap();
        let url = Url::parse("http://a.com/p").unwrap();
        assert_eq!(
            settings.render_matches("line1\nfoo bar\nbaz\n", &url),
            vec!["http://a.com/p: 2: foo bar"]
        );
    }

    #[test]
    fn test_domains_are_normalized() {
        let settings = Settings::builder()
            .patterns(["x"])
            .allowed_domains([" B.com ", "", "c.com."])
            .build()
            .unwrap();
        let expected: HashSet<String> = ["b.com", "c.com"].iter().map(|s| s.to_string()).collect();
        assert_eq!(settings.allowed_domains, expected);
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let settings = Settings::builder().patterns(["x"]).method("head").build().unwrap();
        assert_eq!(settings.method, Method::HEAD);
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        assert!(Settings::builder().patterns(["x"]).concurrency(0).build().is_err());
        assert!(Settings::builder().patterns(["x"]).method("BAD METHOD").build().is_err());
        assert!(Settings::builder().patterns(["x"]).rate(-2.0).build().is_err());
        assert!(Settings::builder()
            .patterns(["a["])
            .mode(PatternMode::Selector(SelectorTarget::Text))
            .build()
            .is_err());
    }
}
