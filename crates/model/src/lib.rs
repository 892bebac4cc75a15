//! Gateway message model.
//!
//! - **Replies**: the closed [`Reply`] enum and its payloads
//! - **Requests**: the [`Request`] enum sent through the engine
//! - **Order enums**: [`OrderSide`], [`OrderType`], [`OrderStatus`], [`TimeInForce`]

mod order;
mod reply;
mod request;

pub use order::{OrderSide, OrderStatus, OrderType, TimeInForce};
pub use reply::{
    AccountDownloadEnd, AccountUpdateTime, AccountValue, AccountValueKey, Diagnostic,
    ExecutionData, OpaqueReply, OpenOrder, OrderStatusUpdate, PortfolioValue,
    PortfolioValueKey, RealtimeBar, Reply, Severity, WARNING_CODES,
};
pub use request::{
    BarSource, CancelOrder, CancelRealtimeBars, PlaceOrder, Request, RequestAccountUpdates,
    RequestRealtimeBars,
};

/// Order identifier, assigned at submission and unique per session.
pub type OrderId = i64;

/// Request identifier for non-order requests.
pub type RequestId = i64;

/// Routing id for replies that carry no request or order id.
pub const UNMATCHED_REPLY_ID: i64 = i64::MIN;
