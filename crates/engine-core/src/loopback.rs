//! In-process engine.
//!
//! `LoopbackEngine` implements [`Engine`] on top of a [`ReplyRouter`] without
//! a gateway behind it. Replies are injected with [`LoopbackEngine::deliver`]
//! and outbound requests are recorded instead of transmitted. It is the engine
//! used to exercise managers in tests and offline tooling.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use model::{OrderId, Reply, Request, RequestId};
use parking_lot::Mutex;
use tracing::debug;

use crate::router::ReplyRouter;
use crate::{ConsumerId, Engine, EngineError, ReplyConsumer};

/// First request id handed out. Order ids count up from 1 and share the
/// routing table with request ids, so the two ranges must not meet.
pub const REQUEST_ID_BASE: RequestId = 100_000_000;

pub struct LoopbackEngine {
    router: ReplyRouter,
    connected: AtomicBool,
    reject_next: Mutex<Option<EngineError>>,
    sent: Mutex<Vec<Request>>,
    unsubscribes: Mutex<Vec<(ConsumerId, i64)>>,
    next_request_id: AtomicI64,
    next_order_id: AtomicI64,
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackEngine {
    /// Create a connected engine. Order ids start at 1 and request ids at
    /// [`REQUEST_ID_BASE`].
    pub fn new() -> Self {
        Self {
            router: ReplyRouter::new(),
            connected: AtomicBool::new(true),
            reject_next: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            unsubscribes: Mutex::new(Vec::new()),
            next_request_id: AtomicI64::new(REQUEST_ID_BASE),
            next_order_id: AtomicI64::new(1),
        }
    }

    /// Start order id allocation at `first`.
    pub fn with_first_order_id(self, first: OrderId) -> Self {
        self.next_order_id.store(first, Ordering::SeqCst);
        self
    }

    /// Create a shared engine.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Inject a reply as if it had arrived from the gateway.
    ///
    /// Returns the number of consumers it was delivered to.
    pub fn deliver(&self, reply: Reply) -> usize {
        self.router.route(reply)
    }

    /// Make the next `send` fail with `error`.
    pub fn reject_next_send(&self, error: EngineError) {
        *self.reject_next.lock() = Some(error);
    }

    /// While disconnected every `send` fails with [`EngineError::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Requests accepted so far, in send order.
    pub fn sent_requests(&self) -> Vec<Request> {
        self.sent.lock().clone()
    }

    /// Every `unsubscribe` call made so far, in call order.
    pub fn unsubscribe_calls(&self) -> Vec<(ConsumerId, i64)> {
        self.unsubscribes.lock().clone()
    }

    /// The routing table.
    pub fn router(&self) -> &ReplyRouter {
        &self.router
    }
}

impl Engine for LoopbackEngine {
    fn subscribe(&self, consumer: &ReplyConsumer, id: i64) {
        self.router.subscribe(consumer, id);
    }

    fn subscribe_all(&self, consumer: &ReplyConsumer) {
        self.router.subscribe_all(consumer);
    }

    fn unsubscribe(&self, consumer: &ReplyConsumer, id: i64) {
        self.unsubscribes.lock().push((consumer.id(), id));
        self.router.unsubscribe(consumer, id);
    }

    fn unsubscribe_all(&self, consumer: &ReplyConsumer) {
        self.router.unsubscribe_all(consumer);
    }

    fn send(&self, request: Request) -> Result<(), EngineError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(EngineError::NotConnected);
        }
        if let Some(error) = self.reject_next.lock().take() {
            debug!(kind = request.kind(), id = ?request.id(), error = %error, "rejecting request");
            return Err(error);
        }
        debug!(kind = request.kind(), id = ?request.id(), "request sent");
        self.sent.lock().push(request);
        Ok(())
    }

    fn next_request_id(&self) -> RequestId {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn next_order_id(&self) -> OrderId {
        self.next_order_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_reply_channel;
    use model::{CancelOrder, Diagnostic};

    #[test]
    fn test_send_records_request() {
        let engine = LoopbackEngine::new();
        engine
            .send(Request::CancelOrder(CancelOrder { order_id: 3 }))
            .unwrap();

        assert_eq!(
            engine.sent_requests(),
            vec![Request::CancelOrder(CancelOrder { order_id: 3 })]
        );
    }

    #[test]
    fn test_reject_next_send_only_once() {
        let engine = LoopbackEngine::new();
        engine.reject_next_send(EngineError::Rejected("duplicate id".into()));

        let request = Request::CancelOrder(CancelOrder { order_id: 3 });
        assert_eq!(
            engine.send(request.clone()),
            Err(EngineError::Rejected("duplicate id".into()))
        );
        assert!(engine.send(request).is_ok());
        assert_eq!(engine.sent_requests().len(), 1);
    }

    #[test]
    fn test_disconnected_rejects_all() {
        let engine = LoopbackEngine::new();
        engine.set_connected(false);

        let request = Request::CancelOrder(CancelOrder { order_id: 3 });
        assert_eq!(engine.send(request), Err(EngineError::NotConnected));
        assert!(engine.sent_requests().is_empty());
    }

    #[test]
    fn test_id_allocation() {
        let engine = LoopbackEngine::new().with_first_order_id(100);
        assert_eq!(engine.next_order_id(), 100);
        assert_eq!(engine.next_order_id(), 101);
        assert_eq!(engine.next_request_id(), REQUEST_ID_BASE);
        assert_eq!(engine.next_request_id(), REQUEST_ID_BASE + 1);
    }

    #[test]
    fn test_request_and_order_ids_never_collide() {
        let engine = LoopbackEngine::new();
        let orders: Vec<OrderId> = (0..1000).map(|_| engine.next_order_id()).collect();
        let requests: Vec<RequestId> = (0..1000).map(|_| engine.next_request_id()).collect();

        assert!(orders.iter().all(|id| !requests.contains(id)));
    }

    #[test]
    fn test_order_and_request_replies_route_apart() {
        let engine = LoopbackEngine::new();
        let (orders, mut order_rx) = create_reply_channel();
        let (bars, mut bar_rx) = create_reply_channel();
        let order_id = engine.next_order_id();
        let request_id = engine.next_request_id();
        engine.subscribe(&orders, order_id);
        engine.subscribe(&bars, request_id);

        engine.deliver(Reply::Diagnostic(Diagnostic::new(order_id, 201, "Order rejected")));

        assert!(order_rx.try_recv().is_ok());
        assert!(bar_rx.try_recv().is_err());
    }

    #[test]
    fn test_deliver_and_unsubscribe_log() {
        let engine = LoopbackEngine::new();
        let (consumer, mut rx) = create_reply_channel();

        engine.subscribe(&consumer, 9);
        assert_eq!(engine.deliver(Reply::Diagnostic(Diagnostic::new(9, 202, "x"))), 1);
        assert!(rx.try_recv().is_ok());

        engine.unsubscribe(&consumer, 9);
        assert_eq!(engine.unsubscribe_calls(), vec![(consumer.id(), 9)]);
        assert_eq!(engine.deliver(Reply::Diagnostic(Diagnostic::new(9, 202, "x"))), 0);
    }
}
