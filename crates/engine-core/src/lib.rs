//! Engine collaborator surface.
//!
//! The engine owns the gateway connection, framing, and request-id
//! allocation. Managers only need the narrow [`Engine`] trait: register
//! interest in reply ids, send requests, and receive replies on their own
//! [`ReplyReceiver`].
//!
//! - [`ReplyRouter`]: subscription table that fans replies out to consumers
//! - [`LoopbackEngine`]: in-process engine built on the router; it records
//!   outbound traffic and never touches a network

mod loopback;
mod router;

pub use loopback::{LoopbackEngine, REQUEST_ID_BASE};
pub use router::ReplyRouter;

use std::fmt;
use std::sync::Arc;

use model::{OrderId, Reply, Request, RequestId};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("not connected to gateway")]
    NotConnected,

    #[error("channel closed")]
    ChannelClosed,
}

/// Identity of a reply consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

/// Reply queues are unbounded so the engine's dispatch never waits on a
/// slow manager.
pub type ReplySender = mpsc::UnboundedSender<Reply>;
pub type ReplyReceiver = mpsc::UnboundedReceiver<Reply>;

/// The sending half of a manager's reply queue, plus its identity.
#[derive(Debug, Clone)]
pub struct ReplyConsumer {
    id: ConsumerId,
    sender: ReplySender,
}

impl ReplyConsumer {
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn sender(&self) -> &ReplySender {
        &self.sender
    }

    /// Push a reply into the queue. Returns false if the receiver is gone.
    pub fn deliver(&self, reply: Reply) -> bool {
        self.sender.send(reply).is_ok()
    }
}

/// Create a reply queue for one manager.
pub fn create_reply_channel() -> (ReplyConsumer, ReplyReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        ReplyConsumer {
            id: ConsumerId::new(),
            sender,
        },
        receiver,
    )
}

/// What a manager needs from the engine.
///
/// All methods are synchronous: subscription changes only touch the routing
/// table, and `send` reports acceptance or rejection of the outbound request
/// without waiting for any reply.
pub trait Engine: Send + Sync {
    /// Deliver replies tagged with `id` to `consumer`.
    fn subscribe(&self, consumer: &ReplyConsumer, id: i64);

    /// Deliver every reply to `consumer`.
    fn subscribe_all(&self, consumer: &ReplyConsumer);

    /// Stop delivering replies tagged with `id` to `consumer`.
    fn unsubscribe(&self, consumer: &ReplyConsumer, id: i64);

    /// Undo [`Engine::subscribe_all`].
    fn unsubscribe_all(&self, consumer: &ReplyConsumer);

    /// Send a request to the gateway.
    fn send(&self, request: Request) -> Result<(), EngineError>;

    /// Allocate a request id.
    fn next_request_id(&self) -> RequestId;

    /// Allocate an order id.
    fn next_order_id(&self) -> OrderId;
}

/// Shared handle to an engine.
pub type SharedEngine = Arc<dyn Engine>;
