//! Replies delivered by the gateway.
//!
//! Every inbound message is one variant of the closed [`Reply`] enum. Adding a
//! reply kind means adding a variant, and every manager's `match` must then
//! decide what to do with it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::{OrderSide, OrderStatus, OrderType, TimeInForce};
use crate::{OrderId, RequestId, UNMATCHED_REPLY_ID};

/// Diagnostic codes the gateway classifies as warnings rather than errors.
pub const WARNING_CODES: std::ops::RangeInclusive<i64> = 2100..=2199;

/// Acceptance of an order by the broker (the gateway's "open order" message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    /// Order identifier assigned at submission.
    pub order_id: OrderId,
    /// Account the order was placed in.
    pub account: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Buy or sell.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Total order quantity.
    pub quantity: Decimal,
    /// Limit price, if the order type has one.
    pub limit_price: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Broker state at the time of the message.
    pub status: OrderStatus,
}

/// Order status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    /// Order identifier.
    pub order_id: OrderId,
    /// Broker-assigned state.
    pub status: OrderStatus,
    /// Quantity filled so far.
    pub filled: Decimal,
    /// Quantity still working.
    pub remaining: Decimal,
    /// Average price of all fills so far.
    pub avg_fill_price: Decimal,
    /// Price of the most recent fill.
    pub last_fill_price: Decimal,
    /// Reason the order is held, empty if it is not.
    pub why_held: String,
}

/// A single execution (partial or full fill) of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionData {
    /// Order identifier.
    pub order_id: OrderId,
    /// Unique execution identifier.
    pub exec_id: String,
    /// Account the execution belongs to.
    pub account: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Side of the execution.
    pub side: OrderSide,
    /// Quantity executed in this fill.
    pub shares: Decimal,
    /// Price of this fill.
    pub price: Decimal,
    /// Cumulative quantity executed for the order.
    pub cumulative_qty: Decimal,
    /// Average price across all fills for the order.
    pub avg_price: Decimal,
    /// Gateway timestamp of the execution.
    pub time: String,
}

/// How the gateway grades a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Informational; the request it refers to is unaffected.
    Warning,
    /// The request or connection it refers to has a problem.
    Error,
}

/// Diagnostic (error or warning) message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Request or order id the message refers to; negative when it refers to none.
    pub id: i64,
    /// Gateway message code.
    pub code: i64,
    /// Human-readable text.
    pub message: String,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(id: i64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            code,
            message: message.into(),
        }
    }

    /// Severity implied by the message code.
    pub fn severity(&self) -> Severity {
        if WARNING_CODES.contains(&self.code) {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    /// Check if this diagnostic is only a warning.
    pub fn is_warning(&self) -> bool {
        self.severity() == Severity::Warning
    }

    /// Id used for routing: the referenced id, or the unmatched marker.
    pub fn correlation_id(&self) -> i64 {
        if self.id < 0 {
            UNMATCHED_REPLY_ID
        } else {
            self.id
        }
    }
}

/// Key of an account value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountValueKey {
    /// Account code.
    pub account_code: String,
    /// Value name (e.g. `NetLiquidation`).
    pub key: String,
    /// Currency the value is expressed in; empty when not monetary.
    pub currency: String,
}

impl AccountValueKey {
    /// Create a new key.
    pub fn new(
        account_code: impl Into<String>,
        key: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            account_code: account_code.into(),
            key: key.into(),
            currency: currency.into(),
        }
    }
}

/// A single account value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountValue {
    /// Which value this is.
    pub key: AccountValueKey,
    /// Raw value as sent by the gateway.
    pub value: String,
}

/// Key of a portfolio position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortfolioValueKey {
    /// Account code.
    pub account_code: String,
    /// Gateway contract identifier.
    pub contract_id: i64,
}

/// A portfolio position with valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValue {
    /// Which position this is.
    pub key: PortfolioValueKey,
    /// Instrument symbol.
    pub symbol: String,
    /// Signed position size.
    pub position: Decimal,
    /// Current market price.
    pub market_price: Decimal,
    /// Current market value.
    pub market_value: Decimal,
    /// Average cost per unit.
    pub average_cost: Decimal,
    /// Unrealized PnL.
    pub unrealized_pnl: Decimal,
    /// Realized PnL.
    pub realized_pnl: Decimal,
}

/// Timestamp of the latest account update batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdateTime {
    /// Gateway time string (`HH:MM`).
    pub time: String,
}

/// Marks the end of the initial account download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDownloadEnd {
    /// Account code that finished downloading.
    pub account_code: String,
}

/// A realtime bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeBar {
    /// Request id of the bar subscription.
    pub request_id: RequestId,
    /// Bar start time, seconds since the Unix epoch.
    pub time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Volume-weighted average price.
    pub wap: Decimal,
    /// Number of trades in the bar.
    pub count: i64,
}

/// A reply kind this layer has no schema for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueReply {
    /// Correlating id, if the message carried one.
    pub id: Option<i64>,
    /// Gateway message name.
    pub kind: String,
}

/// An inbound gateway reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// The broker accepted an order.
    Acknowledgement(OpenOrder),
    /// Order status changed.
    Status(OrderStatusUpdate),
    /// An order was (partially) executed.
    Execution(ExecutionData),
    /// Error or warning.
    Diagnostic(Diagnostic),
    AccountValue(AccountValue),
    PortfolioValue(PortfolioValue),
    AccountUpdateTime(AccountUpdateTime),
    AccountDownloadEnd(AccountDownloadEnd),
    RealtimeBar(RealtimeBar),
    /// Anything else.
    Other(OpaqueReply),
}

impl Reply {
    /// Id the engine uses to route this reply to subscribers.
    pub fn reply_id(&self) -> i64 {
        match self {
            Reply::Acknowledgement(r) => r.order_id,
            Reply::Status(r) => r.order_id,
            Reply::Execution(r) => r.order_id,
            Reply::Diagnostic(r) => r.correlation_id(),
            Reply::AccountValue(_)
            | Reply::PortfolioValue(_)
            | Reply::AccountUpdateTime(_)
            | Reply::AccountDownloadEnd(_) => UNMATCHED_REPLY_ID,
            Reply::RealtimeBar(r) => r.request_id,
            Reply::Other(r) => r.id.unwrap_or(UNMATCHED_REPLY_ID),
        }
    }

    /// Order id for the three order reply kinds.
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Reply::Acknowledgement(r) => Some(r.order_id),
            Reply::Status(r) => Some(r.order_id),
            Reply::Execution(r) => Some(r.order_id),
            _ => None,
        }
    }

    /// Returns the diagnostic if this reply is a severity-warning diagnostic.
    pub fn as_warning(&self) -> Option<&Diagnostic> {
        match self {
            Reply::Diagnostic(d) if d.is_warning() => Some(d),
            _ => None,
        }
    }

    /// Short name of the reply kind, for logs and errors.
    pub fn kind(&self) -> &str {
        match self {
            Reply::Acknowledgement(_) => "acknowledgement",
            Reply::Status(_) => "status",
            Reply::Execution(_) => "execution",
            Reply::Diagnostic(_) => "diagnostic",
            Reply::AccountValue(_) => "account_value",
            Reply::PortfolioValue(_) => "portfolio_value",
            Reply::AccountUpdateTime(_) => "account_update_time",
            Reply::AccountDownloadEnd(_) => "account_download_end",
            Reply::RealtimeBar(_) => "realtime_bar",
            Reply::Other(r) => &r.kind,
        }
    }
}
