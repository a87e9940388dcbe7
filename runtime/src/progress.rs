// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress snapshots and the sinks that receive them.
//!
//! The crawler and search pipeline report through a [`ProgressSink`]. A
//! [`ProgressTracker`] keeps the latest snapshot behind a lock; observers
//! poll it with [`ProgressTracker::feed`], which yields only on change and
//! ends once a terminal snapshot has been delivered. Intermediate snapshots
//! between polls may be missed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time progress of one search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub count: usize,
    pub done: bool,
    pub message: String,
}

impl ProgressSnapshot {
    pub fn running(count: usize, message: impl Into<String>) -> Self {
        Self {
            count,
            done: false,
            message: message.into(),
        }
    }

    pub fn finished(count: usize, message: impl Into<String>) -> Self {
        Self {
            count,
            done: true,
            message: message.into(),
        }
    }
}

/// Receives progress snapshots. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn report(&self, snapshot: ProgressSnapshot);

    /// Start of a new search: discard any earlier terminal state.
    fn reset(&self, message: &str) {
        self.report(ProgressSnapshot::running(0, message));
    }
}

/// Discards everything.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _snapshot: ProgressSnapshot) {}
}

/// Mirrors snapshots into the log.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn report(&self, snapshot: ProgressSnapshot) {
        if snapshot.done {
            tracing::info!(count = snapshot.count, "{}", snapshot.message);
        } else {
            tracing::debug!(count = snapshot.count, "{}", snapshot.message);
        }
    }
}

/// Forwards each snapshot to every inner sink.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ProgressSink for FanoutSink {
    fn report(&self, snapshot: ProgressSnapshot) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.report(snapshot.clone());
            }
            last.report(snapshot);
        }
    }

    fn reset(&self, message: &str) {
        for sink in &self.sinks {
            sink.reset(message);
        }
    }
}

/// Shared, lock-guarded latest snapshot for one search.
///
/// Once a terminal snapshot is stored, further reports are ignored until
/// [`ProgressSink::reset`].
#[derive(Clone, Default)]
pub struct ProgressTracker {
    state: Arc<Mutex<ProgressSnapshot>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }

    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    /// Poll every `interval`, yielding each changed snapshot. The stream
    /// ends after yielding a terminal one.
    pub fn feed(&self, interval: Duration) -> impl Stream<Item = ProgressSnapshot> {
        let tracker = self.clone();
        async_stream::stream! {
            let mut ticker = tokio::time::interval(interval);
            let mut last: Option<ProgressSnapshot> = None;
            loop {
                ticker.tick().await;
                let current = tracker.snapshot();
                if last.as_ref() == Some(&current) {
                    continue;
                }
                let done = current.done;
                last = Some(current.clone());
                yield current;
                if done {
                    break;
                }
            }
        }
    }
}

impl ProgressSink for ProgressTracker {
    fn report(&self, snapshot: ProgressSnapshot) {
        let mut state = self.lock();
        if !state.done {
            *state = snapshot;
        }
    }

    fn reset(&self, message: &str) {
        *self.lock() = ProgressSnapshot::running(0, message);
    }
}

/// Per-search trackers keyed by id, so concurrent searches never share
/// progress state.
#[derive(Default)]
pub struct ProgressRegistry {
    trackers: Mutex<HashMap<Uuid, ProgressTracker>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, ProgressTracker>> {
        self.trackers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issue a new tracker and its id.
    pub fn create(&self) -> (Uuid, ProgressTracker) {
        let id = Uuid::new_v4();
        let tracker = ProgressTracker::new();
        self.lock().insert(id, tracker.clone());
        tracing::debug!(%id, "progress tracker created");
        (id, tracker)
    }

    pub fn remove(&self, id: &Uuid) -> Option<ProgressTracker> {
        self.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_terminal_snapshot_is_sticky() {
        let tracker = ProgressTracker::new();
        tracker.report(ProgressSnapshot::running(3, "crawling"));
        tracker.report(ProgressSnapshot::finished(3, "done"));
        tracker.report(ProgressSnapshot::running(9, "late"));
        assert_eq!(tracker.snapshot(), ProgressSnapshot::finished(3, "done"));

        tracker.reset("next search");
        assert_eq!(tracker.snapshot().count, 0);
        assert!(!tracker.is_done());
    }

    #[tokio::test]
    async fn test_feed_yields_changes_and_stops() {
        let tracker = ProgressTracker::new();
        tracker.reset("start");

        let writer = tracker.clone();
        let handle = tokio::spawn(async move {
            for i in 1..=3 {
                tokio::time::sleep(Duration::from_millis(15)).await;
                writer.report(ProgressSnapshot::running(i * 10, "loading"));
            }
            tokio::time::sleep(Duration::from_millis(15)).await;
            writer.report(ProgressSnapshot::finished(30, "complete"));
        });

        let seen: Vec<ProgressSnapshot> = tracker.feed(Duration::from_millis(5)).collect().await;
        handle.await.unwrap();

        assert_eq!(seen.first().unwrap().message, "start");
        assert_eq!(seen.last().unwrap(), &ProgressSnapshot::finished(30, "complete"));
        assert!(seen.windows(2).all(|w| w[0] != w[1]));
        assert_eq!(seen.iter().filter(|s| s.done).count(), 1);
    }

    #[test]
    fn test_fanout_forwards_reset() {
        let a = ProgressTracker::new();
        a.report(ProgressSnapshot::finished(4, "Found 4 matches"));
        let fanout = FanoutSink::new().with(Arc::new(a.clone())).with(Arc::new(TracingSink));

        fanout.reset("Starting search...");
        fanout.report(ProgressSnapshot::running(2, "Loading"));

        assert_eq!(a.snapshot(), ProgressSnapshot::running(2, "Loading"));
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = ProgressTracker::new();
        let b = ProgressTracker::new();
        let fanout = FanoutSink::new()
            .with(Arc::new(a.clone()))
            .with(Arc::new(NullSink))
            .with(Arc::new(b.clone()));
        fanout.report(ProgressSnapshot::running(7, "x"));
        assert_eq!(a.snapshot().count, 7);
        assert_eq!(b.snapshot().count, 7);
    }

    #[test]
    fn test_registry_isolates_sessions() {
        let registry = ProgressRegistry::new();
        let (id_a, a) = registry.create();
        let (id_b, b) = registry.create();
        assert_ne!(id_a, id_b);

        a.report(ProgressSnapshot::running(5, "a"));
        b.report(ProgressSnapshot::finished(1, "b"));
        assert_eq!(a.snapshot().count, 5);
        assert!(!a.is_done());
        assert!(b.is_done());

        assert_eq!(registry.remove(&id_b).map(|t| t.snapshot().count), Some(1));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&id_a).is_some());
        assert!(registry.is_empty());
    }
}
