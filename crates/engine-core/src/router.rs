//! Reply routing table.
//!
//! Consumers register interest either in a single reply id or in every
//! reply. [`ReplyRouter::route`] hands each reply to every interested
//! consumer exactly once, even when a consumer is registered both ways.
//! Consumers whose queue has been dropped are pruned on the next delivery
//! attempt.

use std::collections::HashMap;

use dashmap::DashMap;
use model::Reply;
use tracing::{debug, trace};

use crate::{ConsumerId, ReplyConsumer, ReplySender};

/// Thread-safe subscription table.
#[derive(Default)]
pub struct ReplyRouter {
    by_id: DashMap<i64, HashMap<ConsumerId, ReplySender>>,
    catch_all: DashMap<ConsumerId, ReplySender>,
}

impl ReplyRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route replies tagged with `id` to `consumer`.
    pub fn subscribe(&self, consumer: &ReplyConsumer, id: i64) {
        self.by_id
            .entry(id)
            .or_default()
            .insert(consumer.id(), consumer.sender().clone());
    }

    /// Route every reply to `consumer`.
    pub fn subscribe_all(&self, consumer: &ReplyConsumer) {
        self.catch_all
            .insert(consumer.id(), consumer.sender().clone());
    }

    /// Remove the `id` subscription for `consumer`.
    ///
    /// Returns `true` if a subscription was removed.
    pub fn unsubscribe(&self, consumer: &ReplyConsumer, id: i64) -> bool {
        let removed = match self.by_id.get_mut(&id) {
            Some(mut subs) => subs.remove(&consumer.id()).is_some(),
            None => false,
        };
        self.by_id.remove_if(&id, |_, subs| subs.is_empty());
        removed
    }

    /// Remove the catch-all subscription for `consumer`.
    ///
    /// Returns `true` if a subscription was removed.
    pub fn unsubscribe_all(&self, consumer: &ReplyConsumer) -> bool {
        self.catch_all.remove(&consumer.id()).is_some()
    }

    /// Deliver a reply to every interested consumer.
    ///
    /// Returns the number of consumers the reply was delivered to.
    pub fn route(&self, reply: Reply) -> usize {
        let id = reply.reply_id();

        let mut targets: Vec<(ConsumerId, ReplySender)> = self
            .catch_all
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        if let Some(subs) = self.by_id.get(&id) {
            for (consumer_id, sender) in subs.iter() {
                if !targets.iter().any(|(c, _)| c == consumer_id) {
                    targets.push((*consumer_id, sender.clone()));
                }
            }
        }

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (consumer_id, sender) in targets {
            if sender.send(reply.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(consumer_id);
            }
        }

        for consumer_id in dead {
            debug!(consumer = %consumer_id, "pruning consumer with closed reply queue");
            self.remove_consumer(consumer_id);
        }

        if delivered == 0 {
            trace!(id, kind = reply.kind(), "no subscriber for reply");
        }

        delivered
    }

    /// Number of consumers subscribed to `id` (catch-all subscribers excluded).
    pub fn subscriber_count(&self, id: i64) -> usize {
        self.by_id.get(&id).map(|subs| subs.len()).unwrap_or(0)
    }

    /// Number of catch-all subscribers.
    pub fn catch_all_count(&self) -> usize {
        self.catch_all.len()
    }

    /// Check if `consumer` is subscribed to `id`.
    pub fn is_subscribed(&self, consumer: ConsumerId, id: i64) -> bool {
        self.by_id
            .get(&id)
            .map(|subs| subs.contains_key(&consumer))
            .unwrap_or(false)
    }

    fn remove_consumer(&self, consumer: ConsumerId) {
        self.catch_all.remove(&consumer);
        self.by_id.retain(|_, subs| {
            subs.remove(&consumer);
            !subs.is_empty()
        });
    }
}
