// src/crawl/limiter.rs
// =============================================================================
// Token-bucket gate consulted before every outbound request.
//
// Unlimited mode never waits. Limited mode refills one token every
// `1 / requests_per_second` seconds and holds at most `burst` tokens, starting
// full. The bucket itself is governor's GCRA limiter, which is lock-free and
// safe to share between all workers.
//
// A cancelled run aborts the wait; the caller reports that as a failure for
// the URL it was about to fetch.
// =============================================================================

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as GovernorRateLimiter};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, WeepError};

/// Request rate configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RateLimit {
    #[default]
    Unlimited,
    PerSecond { requests: f64, burst: u32 },
}

impl RateLimit {
    // Builds a rate from the command-line value, 0 meaning unlimited
    pub fn from_rate(requests: f64, burst: u32) -> Result<Self> {
        if !requests.is_finite() || requests < 0.0 {
            return Err(WeepError::Config(format!(
                "request rate must be a non-negative number, got {requests}"
            )));
        }
        if burst == 0 {
            return Err(WeepError::Config("burst must be at least 1".to_string()));
        }
        if requests == 0.0 {
            return Ok(RateLimit::Unlimited);
        }

        // The refill interval must fit in a Duration; tiny rates overflow it
        let limit = RateLimit::PerSecond { requests, burst };
        if limit.interval().is_none() {
            return Err(WeepError::Config(format!("request rate {requests} is too low")));
        }
        Ok(limit)
    }

    /// Time between two token refills
    pub fn interval(&self) -> Option<Duration> {
        match self {
            RateLimit::Unlimited => None,
            RateLimit::PerSecond { requests, .. } => Duration::try_from_secs_f64(1.0 / requests).ok(),
        }
    }
}

pub struct RateLimiter {
    bucket: Option<DefaultDirectRateLimiter>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limited", &self.bucket.is_some())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Result<Self> {
        let bucket = match limit {
            RateLimit::Unlimited => None,
            RateLimit::PerSecond { burst, .. } => {
                let interval = limit
                    .interval()
                    .ok_or_else(|| WeepError::Config("missing rate interval".to_string()))?;
                let burst = NonZeroU32::new(burst)
                    .ok_or_else(|| WeepError::Config("burst must be at least 1".to_string()))?;
                let quota = Quota::with_period(interval)
                    .ok_or_else(|| WeepError::Config("request rate is too high".to_string()))?
                    .allow_burst(burst);
                Some(GovernorRateLimiter::direct(quota))
            }
        };

        Ok(Self { bucket })
    }

    // Waits for a token on behalf of `url`
    //
    // Returns Err(Cancelled) if `cancel` fires first.
    pub async fn acquire(&self, url: &str, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(WeepError::Cancelled {
                url: url.to_string(),
            });
        }

        let Some(bucket) = &self.bucket else {
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WeepError::Cancelled { url: url.to_string() }),
            _ = bucket.until_ready() => {
                debug!(url, "rate limiter token acquired");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_zero_rate_is_unlimited() {
        assert_eq!(RateLimit::from_rate(0.0, 1).unwrap(), RateLimit::Unlimited);
    }

    #[test]
    fn test_invalid_rates_are_rejected() {
        assert!(RateLimit::from_rate(-1.0, 1).is_err());
        assert!(RateLimit::from_rate(f64::NAN, 1).is_err());
        assert!(RateLimit::from_rate(1.0, 0).is_err());
    }

    #[test]
    fn test_rates_too_low_for_an_interval_are_config_errors() {
        for rate in [1e-20, f64::MIN_POSITIVE / 4.0] {
            let err = RateLimit::from_rate(rate, 1).unwrap_err();
            assert!(err.is_fatal());
        }
        // A limit built by hand still fails cleanly instead of panicking
        let limit = RateLimit::PerSecond { requests: 1e-20, burst: 1 };
        assert_eq!(limit.interval(), None);
        assert!(RateLimiter::new(limit).is_err());
    }

    #[test]
    fn test_interval_is_inverse_of_rate() {
        let limit = RateLimit::from_rate(4.0, 1).unwrap();
        assert_eq!(limit.interval(), Some(Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let limiter = RateLimiter::new(RateLimit::Unlimited).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire("http://a.com", &cancel).await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_sequential_acquires_are_spaced_by_interval() {
        let limiter = RateLimiter::new(RateLimit::from_rate(5.0, 1).unwrap()).unwrap();
        let cancel = CancellationToken::new();

        limiter.acquire("http://a.com/1", &cancel).await.unwrap();
        let start = Instant::now();
        limiter.acquire("http://a.com/2", &cancel).await.unwrap();

        // 200ms interval, allow some timer slack
        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_burst_allows_immediate_tokens() {
        let limiter = RateLimiter::new(RateLimit::from_rate(1.0, 3).unwrap()).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire("http://a.com", &cancel).await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_cancel_aborts_wait() {
        let limiter = RateLimiter::new(RateLimit::from_rate(0.1, 1).unwrap()).unwrap();
        let cancel = CancellationToken::new();
        limiter.acquire("http://a.com/1", &cancel).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = limiter.acquire("http://a.com/2", &cancel).await.unwrap_err();
        assert!(matches!(err, WeepError::Cancelled { ref url } if url == "http://a.com/2"));
    }
}
