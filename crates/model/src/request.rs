//! Outbound requests.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::{OrderSide, OrderType, TimeInForce};
use crate::{OrderId, RequestId};

/// Place a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrder {
    /// Order id; allocated from the engine at submission when `None`.
    pub order_id: Option<OrderId>,
    /// Instrument symbol.
    pub symbol: String,
    /// Buy or sell.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Total quantity.
    pub quantity: Decimal,
    /// Limit price (None for market orders).
    pub limit_price: Option<Decimal>,
    /// Stop trigger price for stop orders.
    pub aux_price: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Account to place the order in; the gateway default when `None`.
    pub account: Option<String>,
}

impl PlaceOrder {
    /// A day market order.
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            order_id: None,
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            aux_price: None,
            time_in_force: TimeInForce::Day,
            account: None,
        }
    }

    /// A day limit order.
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(price),
            ..Self::market(symbol, side, quantity)
        }
    }

    /// Use an explicit order id.
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Set the time in force.
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }
}

/// Cancel a working order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
}

/// Start or stop the account update stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccountUpdates {
    /// `true` to start, `false` to stop.
    pub subscribe: bool,
    /// Account code; empty selects the gateway's default account.
    pub account_code: String,
}

/// Price series a bar is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarSource {
    Trades,
    Midpoint,
    Bid,
    Ask,
}

impl BarSource {
    /// Convert to the gateway's string representation.
    pub fn as_gateway_str(&self) -> &'static str {
        match self {
            Self::Trades => "TRADES",
            Self::Midpoint => "MIDPOINT",
            Self::Bid => "BID",
            Self::Ask => "ASK",
        }
    }
}

/// Subscribe to realtime bars for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRealtimeBars {
    /// Request id; assigned by the manager from the engine.
    pub request_id: RequestId,
    /// Instrument symbol.
    pub symbol: String,
    /// Bar length in seconds.
    pub bar_size_secs: u32,
    /// Price series.
    pub what_to_show: BarSource,
    /// Only data from regular trading hours.
    pub use_rth: bool,
}

impl RequestRealtimeBars {
    /// Five-second trade bars, the gateway's only supported bar size.
    pub fn trades(symbol: impl Into<String>) -> Self {
        Self {
            request_id: 0,
            symbol: symbol.into(),
            bar_size_secs: 5,
            what_to_show: BarSource::Trades,
            use_rth: false,
        }
    }
}

/// Stop a realtime bar subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRealtimeBars {
    pub request_id: RequestId,
}

/// An outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    PlaceOrder(PlaceOrder),
    CancelOrder(CancelOrder),
    AccountUpdates(RequestAccountUpdates),
    RealtimeBars(RequestRealtimeBars),
    CancelRealtimeBars(CancelRealtimeBars),
}

impl Request {
    /// Id the request is tagged with, if any.
    pub fn id(&self) -> Option<i64> {
        match self {
            Request::PlaceOrder(r) => r.order_id,
            Request::CancelOrder(r) => Some(r.order_id),
            Request::AccountUpdates(_) => None,
            Request::RealtimeBars(r) => Some(r.request_id),
            Request::CancelRealtimeBars(r) => Some(r.request_id),
        }
    }

    /// Short name of the request kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::PlaceOrder(_) => "place_order",
            Request::CancelOrder(_) => "cancel_order",
            Request::AccountUpdates(_) => "account_updates",
            Request::RealtimeBars(_) => "realtime_bars",
            Request::CancelRealtimeBars(_) => "cancel_realtime_bars",
        }
    }
}
