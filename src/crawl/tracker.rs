// src/crawl/tracker.rs
// =============================================================================
// Completion tracker: counts work that has been enqueued but not finished.
//
// - add() before every enqueue (seed or discovered link)
// - complete() when a URL reaches a terminal state (done, failed, dropped)
// - seal() once the seed side has pushed everything it will push
//
// The run is finished exactly when the tracker is sealed and the count is
// zero. Workers wait on finished() alongside the queue.
// =============================================================================

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::watch;
use tracing::warn;

#[derive(Debug)]
pub struct CompletionTracker {
    pending: AtomicUsize,
    sealed: AtomicBool,
    done: watch::Sender<bool>,
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionTracker {
    pub fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            pending: AtomicUsize::new(0),
            sealed: AtomicBool::new(false),
            done,
        }
    }

    /// Registers one unit of work about to be enqueued
    pub fn add(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    // Marks one unit of work as finished
    //
    // A completion without a matching add() is refused, the counter never
    // goes below zero.
    pub fn complete(&self) {
        let previous = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        match previous {
            Ok(1) => self.check(),
            Ok(_) => {}
            Err(_) => warn!("completion tracker underflow ignored"),
        }
    }

    /// No more seeds will be added
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
        self.check();
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        *self.done.borrow()
    }

    /// Resolves once the tracker is sealed and nothing is pending
    pub async fn finished(&self) {
        if self.is_finished() {
            return;
        }
        let mut rx = self.done.subscribe();
        // The sender lives in self, so the channel cannot close while we wait
        let _ = rx.wait_for(|done| *done).await;
    }

    fn check(&self) {
        if self.sealed.load(Ordering::SeqCst) && self.pending.load(Ordering::SeqCst) == 0 {
            self.done.send_replace(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_not_finished_before_seal() {
        let tracker = CompletionTracker::new();
        tracker.add();
        tracker.complete();
        assert_eq!(tracker.pending(), 0);
        assert!(!tracker.is_finished());
        tracker.seal();
        assert!(tracker.is_finished());
    }

    #[test]
    fn test_sealed_finishes_when_last_item_completes() {
        let tracker = CompletionTracker::new();
        tracker.add();
        tracker.add();
        tracker.seal();
        tracker.complete();
        assert!(!tracker.is_finished());
        tracker.complete();
        assert!(tracker.is_finished());
    }

    #[test]
    fn test_counter_never_goes_negative() {
        let tracker = CompletionTracker::new();
        tracker.complete();
        assert_eq!(tracker.pending(), 0);
        tracker.add();
        assert_eq!(tracker.pending(), 1);
    }

    #[tokio::test]
    async fn test_finished_wakes_waiters() {
        let tracker = Arc::new(CompletionTracker::new());
        tracker.add();

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.finished().await })
        };

        tracker.seal();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        tracker.complete();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
