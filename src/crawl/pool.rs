// src/crawl/pool.rs
// =============================================================================
// The crawl worker pool.
//
// How a run works:
// 1. Start `concurrency` workers sharing one bounded queue (flume, so every
//    worker can receive from it)
// 2. Push the seed URLs, counting each in the completion tracker, then seal it
// 3. Each worker loops: take a URL, claim it in the visited set, wait for a
//    rate-limiter token, fetch, match, and (unless single-page) extract links
// 4. Discovered links are offered to the queue with try_send. When the queue
//    is full the worker keeps them on its own overflow list and works through
//    it iteratively, handing items back to the queue whenever there is room
// 5. Workers stop once the tracker is sealed and empty, or on cancellation;
//    dropping their event senders closes the results channel
//
// Per URL: Queued -> Claimed -> Fetching -> Matching -> Extracting ->
// Dispatching -> Done. A URL whose claim is refused is dropped right away.
// Every URL that entered the tracker leaves it exactly once.
// =============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::fetch::{Fetcher, Page};
use super::limiter::RateLimiter;
use super::links::extract_links;
use super::tracker::CompletionTracker;
use super::visited::VisitedSet;
use crate::config::Settings;
use crate::error::{Result, WeepError};

/// What workers send to the output aggregator
#[derive(Debug)]
pub enum CrawlEvent {
    /// A fully formatted result line
    Match(String),
    /// A per-URL failure, reported once
    Failure(WeepError),
}

/// Counters for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages fetched successfully
    pub fetched: usize,
    /// Failures reported (invalid seeds, fetch and parse errors)
    pub failed: usize,
    /// Result lines emitted
    pub matches: usize,
    /// Queue items dropped because their URL was already claimed
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct Stats {
    fetched: AtomicUsize,
    failed: AtomicUsize,
    matches: AtomicUsize,
    skipped: AtomicUsize,
}

impl Stats {
    fn summary(&self) -> CrawlSummary {
        CrawlSummary {
            fetched: self.fetched.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            matches: self.matches.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
        }
    }
}

// State shared by every worker of one run
#[derive(Debug)]
struct Shared {
    settings: Arc<Settings>,
    fetcher: Fetcher,
    limiter: RateLimiter,
    visited: VisitedSet,
    tracker: CompletionTracker,
    cancel: CancellationToken,
    stats: Stats,
}

/// One crawl run
#[derive(Debug)]
pub struct Crawler {
    shared: Arc<Shared>,
}

impl Crawler {
    // Prepares a run: builds the HTTP client and the rate limiter
    //
    // Errors here are configuration errors.
    pub fn new(settings: Arc<Settings>, cancel: CancellationToken) -> Result<Self> {
        let fetcher = Fetcher::new(settings.method.clone(), settings.timeout, settings.status_policy)?;
        let limiter = RateLimiter::new(settings.rate_limit)?;

        Ok(Self {
            shared: Arc::new(Shared {
                settings,
                fetcher,
                limiter,
                visited: VisitedSet::new(),
                tracker: CompletionTracker::default(),
                cancel,
                stats: Stats::default(),
            }),
        })
    }

    // Crawls from `seeds` until all discovered work is done or the run is
    // cancelled
    //
    // Parameters:
    //   seeds: raw seed URLs; blank entries are ignored, invalid ones reported
    //   events: results channel; it closes when this returns
    //
    // Returns: counters for the run
    pub async fn run<S>(self, seeds: S, events: mpsc::Sender<CrawlEvent>) -> CrawlSummary
    where
        S: Stream<Item = String>,
    {
        let shared = self.shared;
        let (queue_tx, queue_rx) = flume::bounded::<Url>(shared.settings.queue_capacity);

        let mut workers = JoinSet::new();
        for id in 0..shared.settings.concurrency {
            let worker = Worker {
                id,
                shared: Arc::clone(&shared),
                queue_tx: queue_tx.clone(),
                queue_rx: queue_rx.clone(),
                events: events.clone(),
                overflow: VecDeque::new(),
            };
            workers.spawn(worker.run());
        }
        drop(queue_rx);

        let seeded = seed(&shared, seeds, &queue_tx, &events).await;
        drop(queue_tx);
        drop(events);

        shared.tracker.seal();
        info!(seeded, workers = shared.settings.concurrency, "all seeds queued");

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "crawl worker ended abnormally");
            }
        }

        let summary = shared.stats.summary();
        info!(
            fetched = summary.fetched,
            failed = summary.failed,
            matches = summary.matches,
            visited = shared.visited.len(),
            "crawl finished"
        );
        summary
    }
}

// Pushes seed URLs into the queue, counting each one before the send
//
// Returns the number of seeds queued.
async fn seed<S>(
    shared: &Shared,
    seeds: S,
    queue: &flume::Sender<Url>,
    events: &mpsc::Sender<CrawlEvent>,
) -> usize
where
    S: Stream<Item = String>,
{
    let mut seeds = std::pin::pin!(seeds);
    let mut seeded = 0;

    loop {
        // Stdin may never end, so cancellation has to win over the next line
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            next = seeds.next() => next,
        };
        let Some(raw) = next else { break };

        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(source) => {
                shared.stats.failed.fetch_add(1, Ordering::SeqCst);
                let failure = WeepError::InvalidUrl {
                    url: raw.to_string(),
                    source,
                };
                if events.send(CrawlEvent::Failure(failure)).await.is_err() {
                    warn!("results channel closed, stopping the crawl");
                    shared.cancel.cancel();
                    break;
                }
                continue;
            }
        };

        // Count the seed before it becomes visible to workers, otherwise a
        // fast worker could complete it first and underflow the tracker
        shared.tracker.add();

        // send_async waits while the queue is full; workers never block on
        // the queue, so this always makes progress
        let sent = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => false,
            sent = queue.send_async(url) => sent.is_ok(),
        };
        if !sent {
            // The seed never reached a worker, take it back out of the count
            shared.tracker.complete();
            break;
        }
        seeded += 1;
    }

    seeded
}

struct Worker {
    id: usize,
    shared: Arc<Shared>,
    queue_tx: flume::Sender<Url>,
    queue_rx: flume::Receiver<Url>,
    events: mpsc::Sender<CrawlEvent>,
    /// Links discovered while the queue was full, processed by this worker
    overflow: VecDeque<Url>,
}

impl Worker {
    async fn run(mut self) {
        debug!(worker = self.id, "worker started");

        loop {
            // Cancellation first, then completion, then new work. A worker
            // that sits in recv_async when the last item completes is woken
            // by the tracker, since the queue itself never closes while
            // other workers still hold senders.
            let url = tokio::select! {
                biased;
                _ = self.shared.cancel.cancelled() => break,
                _ = self.shared.tracker.finished() => break,
                next = self.queue_rx.recv_async() => match next {
                    Ok(url) => url,
                    Err(_) => break,
                },
            };

            // The received URL and whatever it discovers are handled by this
            // worker until its overflow is empty or handed back to the queue
            self.overflow.push_back(url);
            self.drain_overflow().await;
        }

        debug!(worker = self.id, pending = self.shared.tracker.pending(), "worker stopped");
    }

    // Processes this worker's own items until none are left
    //
    // Before each item, as much overflow as fits is handed back to the shared
    // queue so idle workers can pick it up.
    async fn drain_overflow(&mut self) {
        while let Some(url) = self.overflow.pop_front() {
            if self.shared.cancel.is_cancelled() {
                self.overflow.clear();
                return;
            }

            self.visit(url).await;

            // Completed only after dispatch, so the links it found were
            // already counted and the tracker cannot reach zero early
            self.shared.tracker.complete();
            self.share_overflow();
        }
    }

    fn share_overflow(&mut self) {
        while let Some(url) = self.overflow.pop_back() {
            if let Err(e) = self.queue_tx.try_send(url) {
                self.overflow.push_back(e.into_inner());
                break;
            }
        }
    }

    // Claimed -> Fetching -> Matching -> Extracting -> Dispatching
    async fn visit(&mut self, url: Url) {
        if !self.shared.visited.try_claim(&url) {
            self.shared.stats.skipped.fetch_add(1, Ordering::SeqCst);
            debug!(%url, "already claimed, dropping");
            return;
        }

        let page = match self.fetch(&url).await {
            Ok(page) => page,
            Err(e) => return self.fail(e).await,
        };
        self.shared.stats.fetched.fetch_add(1, Ordering::SeqCst);
        debug!(%url, status = %page.status, "matching page");

        let settings = Arc::clone(&self.shared.settings);
        let body = String::from_utf8_lossy(&page.body).into_owned();

        for line in settings.render_matches(&body, &page.url) {
            self.shared.stats.matches.fetch_add(1, Ordering::SeqCst);
            self.emit(CrawlEvent::Match(line)).await;
        }

        if settings.single_page {
            return;
        }

        match extract_links(&body, &page.url, &settings.allowed_domains) {
            Ok(links) => self.dispatch(links),
            Err(e) => self.fail(e).await,
        }
    }

    async fn fetch(&self, url: &Url) -> Result<Page> {
        let cancel = &self.shared.cancel;
        self.shared.limiter.acquire(url.as_str(), cancel).await?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WeepError::Cancelled { url: url.to_string() }),
            page = self.shared.fetcher.fetch(url) => page,
        }
    }

    // Offers discovered links to the shared queue without blocking
    //
    // Links that don't fit stay with this worker.
    fn dispatch(&mut self, links: Vec<Url>) {
        for link in links {
            if self.shared.visited.contains(&link) {
                continue;
            }

            self.shared.tracker.add();
            match self.queue_tx.try_send(link) {
                Ok(()) => {}
                Err(flume::TrySendError::Full(link)) => self.overflow.push_back(link),
                Err(flume::TrySendError::Disconnected(_)) => self.shared.tracker.complete(),
            }
        }
    }

    async fn fail(&self, error: WeepError) {
        self.shared.stats.failed.fetch_add(1, Ordering::SeqCst);
        debug!(error = %error, url = error.url().unwrap_or_default(), "page failed");
        if error.is_fatal() {
            warn!(error = %error, "stopping the crawl");
            self.shared.cancel.cancel();
        }
        self.emit(CrawlEvent::Failure(error)).await;
    }

    // Sends one event to the aggregator
    //
    // The channel only closes early when the aggregator gave up (e.g. a
    // broken pipe on stdout); nothing can be printed anymore, so the whole
    // run is cancelled.
    async fn emit(&self, event: CrawlEvent) {
        if self.events.send(event).await.is_err() {
            warn!(worker = self.id, "results channel closed, stopping the crawl");
            self.shared.cancel.cancel();
        }
    }
}
