//! Order aggregation.
//!
//! # Merge rules
//!
//! | reply            | effect                                          |
//! |------------------|-------------------------------------------------|
//! | acknowledgement  | overwrite `acknowledgement`                     |
//! | status           | overwrite `status`                              |
//! | execution        | append to `executions`                          |
//! | warning          | absorbed                                        |
//! | cancel ack code  | absorbed, logged                                |
//! | other diagnostic | fatal                                           |
//! | anything else    | per [`UnexpectedReplyPolicy`](common::UnexpectedReplyPolicy) |
//!
//! With [`SubscriptionStrategy::All`] the manager sees every reply on the
//! session. Order replies are still merged (that is the point of the mode),
//! but non-order replies and diagnostics for ids it does not hold are skipped.

use std::sync::Arc;

use common::{ManagerConfig, SubscriptionStrategy};
use engine_core::{create_reply_channel, SharedEngine};
use manager_core::{
    classify_diagnostic, handle_unexpected, DiagnosticClass, ManagerError, ManagerTask,
    ReplyHandler, SnapshotStore, Subscriptions, UpdateStatus,
};
use metrics::{create_metrics, SharedMetrics};
use model::{CancelOrder, Diagnostic, OrderId, PlaceOrder, Reply, Request};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::order_record::OrderRecord;

const NAME: &str = "orders";

type OrderStore = SnapshotStore<OrderId, OrderRecord>;

/// Tracks every order submitted through it.
///
/// Read accessors never wait on the control loop beyond a lock acquisition
/// and may be called from any task.
pub struct OrderManager {
    store: Arc<OrderStore>,
    subscriptions: Arc<Subscriptions>,
    config: ManagerConfig,
    task: ManagerTask,
}

impl OrderManager {
    /// Start an order manager on `engine`.
    pub fn new(engine: SharedEngine, config: ManagerConfig) -> Result<Self, ManagerError> {
        let (consumer, replies) = create_reply_channel();
        let metrics = create_metrics();
        let store = Arc::new(OrderStore::new());
        let subscriptions = Arc::new(Subscriptions::new(engine, consumer, metrics.clone()));

        let handler = OrderHandler {
            store: Arc::clone(&store),
            subscriptions: Arc::clone(&subscriptions),
            config: config.clone(),
            metrics: metrics.clone(),
        };
        let task = ManagerTask::start(handler, replies, metrics)?;

        Ok(Self {
            store,
            subscriptions,
            config,
            task,
        })
    }

    /// Submit an order and start tracking it.
    ///
    /// An id is allocated from the engine if the request has none. On success
    /// an empty record for the id is visible immediately and reported by the
    /// next [`OrderManager::new_data`]. On failure nothing is recorded and any
    /// subscription made for the id is dropped again. Once teardown has
    /// released the manager's subscriptions, fails with
    /// [`ManagerError::Closed`] without contacting the engine.
    pub fn send_order(&self, mut request: PlaceOrder) -> Result<OrderId, ManagerError> {
        if self.subscriptions.is_closed() {
            return Err(ManagerError::Closed);
        }

        let engine = self.subscriptions.engine();
        let order_id = match request.order_id {
            Some(id) => id,
            None => engine.next_order_id(),
        };
        request.order_id = Some(order_id);

        let subscribed_here = self.config.subscription == SubscriptionStrategy::PerId
            && !self.subscriptions.is_subscribed(order_id);
        if subscribed_here && !self.subscriptions.subscribe(order_id) {
            return Err(ManagerError::Closed);
        }

        if let Err(e) = engine.send(Request::PlaceOrder(request)) {
            warn!(manager = NAME, order_id, error = %e, "order submission rejected");
            if subscribed_here {
                self.subscriptions.unsubscribe(order_id);
            }
            return Err(ManagerError::Submission(e));
        }

        self.store.write(|table| {
            table.get_or_insert_with(order_id, || OrderRecord::new(order_id));
            table.mark_changed(order_id);
        });
        info!(manager = NAME, order_id, "order submitted");

        Ok(order_id)
    }

    /// Submit several orders in sequence, stopping at the first rejection.
    ///
    /// Orders accepted before the rejection stay tracked.
    pub fn send_orders(
        &self,
        requests: impl IntoIterator<Item = PlaceOrder>,
    ) -> Result<Vec<OrderId>, ManagerError> {
        requests
            .into_iter()
            .map(|request| self.send_order(request))
            .collect()
    }

    /// Ask the gateway to cancel an order.
    ///
    /// The record is untouched until the gateway confirms with a status reply.
    pub fn cancel_order(&self, order_id: OrderId) -> Result<(), ManagerError> {
        if self.subscriptions.is_closed() {
            return Err(ManagerError::Closed);
        }
        self.subscriptions
            .engine()
            .send(Request::CancelOrder(CancelOrder { order_id }))?;
        debug!(manager = NAME, order_id, "cancellation sent");
        Ok(())
    }

    /// Every known order, in the order each id was first seen.
    pub fn all_data(&self) -> Vec<OrderRecord> {
        self.store.all()
    }

    /// Orders changed since the previous call, clearing the change set.
    pub fn new_data(&self) -> Vec<OrderRecord> {
        self.store.drain_changed()
    }

    /// One order, if known.
    pub fn order(&self, order_id: OrderId) -> Option<OrderRecord> {
        self.store.get(&order_id)
    }

    /// Receiver that ticks whenever [`OrderManager::new_data`] has something new.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.store.changes()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Number of replies the manager has finished merging.
    pub fn processed(&self) -> u64 {
        self.task.processed()
    }

    /// The fatal error that stopped the manager, if any.
    pub fn error(&self) -> Option<ManagerError> {
        self.task.error()
    }

    pub fn errors(&self) -> watch::Receiver<Option<ManagerError>> {
        self.task.errors()
    }

    pub fn metrics(&self) -> &SharedMetrics {
        self.task.metrics()
    }

    /// Request a stop without waiting for teardown.
    pub fn stop(&self) {
        self.task.stop();
    }

    /// Stop the manager and wait for teardown to finish.
    pub async fn close(&self) {
        self.task.close().await;
    }
}

struct OrderHandler {
    store: Arc<OrderStore>,
    subscriptions: Arc<Subscriptions>,
    config: ManagerConfig,
    metrics: SharedMetrics,
}

impl OrderHandler {
    fn subscribed_to_all(&self) -> bool {
        self.config.subscription == SubscriptionStrategy::All
    }

    fn merge(&self, order_id: OrderId, apply: impl FnOnce(&mut OrderRecord)) -> UpdateStatus {
        self.store.write(|table| {
            apply(table.get_or_insert_with(order_id, || OrderRecord::new(order_id)));
            table.mark_changed(order_id);
        });
        UpdateStatus::Changed
    }

    fn diagnostic(&self, diagnostic: Diagnostic) -> Result<UpdateStatus, ManagerError> {
        match classify_diagnostic(&diagnostic, &self.config) {
            DiagnosticClass::Warning => Ok(UpdateStatus::NoChange),
            DiagnosticClass::Informational => {
                self.metrics.inc_informational();
                info!(
                    manager = NAME,
                    order_id = diagnostic.id,
                    code = diagnostic.code,
                    message = %diagnostic.message,
                    "cancellation confirmed"
                );
                Ok(UpdateStatus::NoChange)
            }
            DiagnosticClass::Fatal
                if self.subscribed_to_all()
                    && !self.store.contains_key(&diagnostic.correlation_id()) =>
            {
                debug!(
                    manager = NAME,
                    id = diagnostic.id,
                    code = diagnostic.code,
                    "skipping diagnostic for untracked id"
                );
                Ok(UpdateStatus::NoChange)
            }
            DiagnosticClass::Fatal => Err(ManagerError::from(&diagnostic)),
        }
    }
}

impl ReplyHandler for OrderHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn pre_loop(&mut self) -> Result<(), ManagerError> {
        if self.subscribed_to_all() && !self.subscriptions.subscribe_all() {
            return Err(ManagerError::Closed);
        }
        debug!(manager = NAME, subscription = %self.config.subscription, "subscribed");
        Ok(())
    }

    fn receive(&mut self, reply: Reply) -> Result<UpdateStatus, ManagerError> {
        match reply {
            Reply::Acknowledgement(ack) => {
                Ok(self.merge(ack.order_id, |record| record.acknowledgement = Some(ack)))
            }
            Reply::Status(status) => {
                debug!(manager = NAME, order_id = status.order_id, status = ?status.status, "order status");
                Ok(self.merge(status.order_id, |record| record.status = Some(status)))
            }
            Reply::Execution(execution) => {
                debug!(
                    manager = NAME,
                    order_id = execution.order_id,
                    exec_id = %execution.exec_id,
                    shares = %execution.shares,
                    "execution"
                );
                Ok(self.merge(execution.order_id, |record| record.executions.push(execution)))
            }
            Reply::Diagnostic(diagnostic) => self.diagnostic(diagnostic),
            other @ (Reply::AccountValue(_)
            | Reply::PortfolioValue(_)
            | Reply::AccountUpdateTime(_)
            | Reply::AccountDownloadEnd(_)
            | Reply::RealtimeBar(_)
            | Reply::Other(_)) => {
                if self.subscribed_to_all() {
                    return Ok(UpdateStatus::NoChange);
                }
                handle_unexpected(self.config.unexpected_reply, NAME, &other)
            }
        }
    }

    fn pre_destroy(&mut self) {
        let released = self.subscriptions.release(self.store.keys());
        info!(manager = NAME, released, orders = self.store.len(), "order tracking released");
    }
}
