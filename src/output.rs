// src/output.rs
// =============================================================================
// The output aggregator: the single consumer of the results channel.
//
// Matches and failures arrive interleaved in completion order. Matches are
// written to the match sink (stdout or -o FILE), failures to the error sink
// (stderr), each in the order they were received. Writing stops when every
// worker has dropped its sender and the channel is drained.
// =============================================================================

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::crawl::CrawlEvent;
use crate::error::WeepError;
use crate::matcher::{light_up, FAILURE_COLOR};

/// How many lines went to each sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStats {
    pub matches: usize,
    pub failures: usize,
}

pub struct Aggregator<M, E> {
    matches: M,
    errors: E,
    /// Paint the word "failure" red on the error sink
    color_errors: bool,
}

impl<M, E> Aggregator<M, E>
where
    M: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    pub fn new(matches: M, errors: E, color_errors: bool) -> Self {
        Self {
            matches,
            errors,
            color_errors,
        }
    }

    // Drains `events` until the channel closes, then flushes both sinks
    //
    // Returns the sinks together with the line counts so callers (and tests)
    // can inspect them.
    pub async fn drain(
        mut self,
        mut events: mpsc::Receiver<CrawlEvent>,
    ) -> std::io::Result<(OutputStats, M, E)> {
        let mut stats = OutputStats::default();

        while let Some(event) = events.recv().await {
            match event {
                CrawlEvent::Match(line) => {
                    self.matches.write_all(line.as_bytes()).await?;
                    self.matches.write_all(b"\n").await?;
                    stats.matches += 1;
                }
                CrawlEvent::Failure(error) => {
                    let line = failure_line(&error, self.color_errors);
                    self.errors.write_all(line.as_bytes()).await?;
                    self.errors.write_all(b"\n").await?;
                    stats.failures += 1;
                }
            }
        }

        self.matches.flush().await?;
        self.errors.flush().await?;
        Ok((stats, self.matches, self.errors))
    }
}

// Formats a failure as "failure: <cause>, url: '<url>'"
pub fn failure_line(error: &WeepError, color: bool) -> String {
    let label = if color {
        light_up("failure", FAILURE_COLOR)
    } else {
        "failure".to_string()
    };
    format!("{label}: {error}, url: '{}'", error.url().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn status_failure(url: &str) -> CrawlEvent {
        CrawlEvent::Failure(WeepError::Status {
            url: url.to_string(),
            status: StatusCode::NOT_FOUND,
        })
    }

    #[tokio::test]
    async fn test_matches_and_failures_go_to_separate_sinks() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(CrawlEvent::Match("first".to_string())).await.unwrap();
        tx.send(status_failure("http://a.com/x")).await.unwrap();
        tx.send(CrawlEvent::Match("second".to_string())).await.unwrap();
        drop(tx);

        let aggregator = Aggregator::new(Vec::new(), Vec::new(), false);
        let (stats, matches, errors) = aggregator.drain(rx).await.unwrap();

        assert_eq!(stats, OutputStats { matches: 2, failures: 1 });
        assert_eq!(String::from_utf8(matches).unwrap(), "first\nsecond\n");
        assert_eq!(
            String::from_utf8(errors).unwrap(),
            "failure: HTTP 404 Not Found, url: 'http://a.com/x'\n"
        );
    }

    #[tokio::test]
    async fn test_drain_finishes_when_channel_closes() {
        let (tx, rx) = mpsc::channel::<CrawlEvent>(1);
        drop(tx);
        let (stats, matches, errors) = Aggregator::new(Vec::new(), Vec::new(), false)
            .drain(rx)
            .await
            .unwrap();
        assert_eq!(stats, OutputStats::default());
        assert!(matches.is_empty() && errors.is_empty());
    }

    #[test]
    fn test_colored_failure_label() {
        let error = WeepError::Cancelled {
            url: "http://a.com".to_string(),
        };
        assert_eq!(
            failure_line(&error, true),
            "\x1b[1;31mfailure\x1b[0m: cancelled, url: 'http://a.com'"
        );
    }
}
