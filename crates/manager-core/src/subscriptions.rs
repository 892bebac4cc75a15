//! Engine subscriptions owned by one manager.

use std::collections::{BTreeSet, HashSet};

use engine_core::{ReplyConsumer, SharedEngine};
use metrics::SharedMetrics;
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct Held {
    ids: BTreeSet<i64>,
    released: HashSet<i64>,
    all: bool,
    closed: bool,
}

/// Tracks which ids a manager's consumer is subscribed to, so teardown can
/// release each one exactly once.
///
/// Once [`Subscriptions::release`] has run, new subscriptions are refused.
/// Engine calls happen under the same lock as the bookkeeping, so a
/// subscription can never slip in behind a release.
pub struct Subscriptions {
    engine: SharedEngine,
    consumer: ReplyConsumer,
    held: Mutex<Held>,
    metrics: SharedMetrics,
}

impl Subscriptions {
    pub fn new(engine: SharedEngine, consumer: ReplyConsumer, metrics: SharedMetrics) -> Self {
        Self {
            engine,
            consumer,
            held: Mutex::new(Held::default()),
            metrics,
        }
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    pub fn consumer(&self) -> &ReplyConsumer {
        &self.consumer
    }

    /// Subscribe to replies tagged with `id`.
    ///
    /// Returns `false` without touching the engine if already released.
    pub fn subscribe(&self, id: i64) -> bool {
        let mut held = self.held.lock();
        if held.closed {
            return false;
        }
        self.engine.subscribe(&self.consumer, id);
        held.released.remove(&id);
        held.ids.insert(id);
        true
    }

    /// Subscribe to every reply. Returns `false` if already released.
    pub fn subscribe_all(&self) -> bool {
        let mut held = self.held.lock();
        if held.closed {
            return false;
        }
        self.engine.subscribe_all(&self.consumer);
        held.all = true;
        true
    }

    /// Drop the `id` subscription if it is held. Returns `true` if it was.
    pub fn unsubscribe(&self, id: i64) -> bool {
        let mut held = self.held.lock();
        if !held.ids.remove(&id) {
            return false;
        }
        self.engine.unsubscribe(&self.consumer, id);
        held.released.insert(id);
        self.metrics.inc_unsubscribes();
        true
    }

    pub fn is_subscribed(&self, id: i64) -> bool {
        self.held.lock().ids.contains(&id)
    }

    /// Check if [`Subscriptions::release`] has run.
    pub fn is_closed(&self) -> bool {
        self.held.lock().closed
    }

    /// Release everything: every held subscription plus every id in `seen`,
    /// each exactly once, and the catch-all subscription if held.
    ///
    /// Ids already released by an earlier call are skipped. Returns the
    /// number of per-id unsubscribe calls made.
    pub fn release(&self, seen: impl IntoIterator<Item = i64>) -> usize {
        let mut held = self.held.lock();
        held.closed = true;
        let ids = std::mem::take(&mut held.ids);
        let mut count = 0;

        for id in ids.into_iter().chain(seen) {
            if held.released.insert(id) {
                self.engine.unsubscribe(&self.consumer, id);
                self.metrics.inc_unsubscribes();
                count += 1;
            }
        }

        if std::mem::take(&mut held.all) {
            self.engine.unsubscribe_all(&self.consumer);
        }

        debug!(consumer = %self.consumer.id(), count, "released subscriptions");
        count
    }
}
