//! Order enums as spelled by the gateway.

use serde::{Deserialize, Serialize};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Convert from the gateway's action string.
    pub fn from_gateway_str(s: &str) -> Option<Self> {
        match s {
            "BUY" | "BOT" => Some(Self::Buy),
            "SELL" | "SLD" => Some(Self::Sell),
            _ => None,
        }
    }

    /// Convert to the gateway's action string.
    pub fn as_gateway_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    MarketOnClose,
    LimitOnClose,
}

impl OrderType {
    /// Convert from the gateway's order type string.
    pub fn from_gateway_str(s: &str) -> Option<Self> {
        match s {
            "MKT" => Some(Self::Market),
            "LMT" => Some(Self::Limit),
            "STP" => Some(Self::Stop),
            "STP LMT" => Some(Self::StopLimit),
            "MOC" => Some(Self::MarketOnClose),
            "LOC" => Some(Self::LimitOnClose),
            _ => None,
        }
    }

    /// Convert to the gateway's order type string.
    pub fn as_gateway_str(&self) -> &'static str {
        match self {
            Self::Market => "MKT",
            Self::Limit => "LMT",
            Self::Stop => "STP",
            Self::StopLimit => "STP LMT",
            Self::MarketOnClose => "MOC",
            Self::LimitOnClose => "LOC",
        }
    }

    /// Whether the type carries a limit price.
    pub fn requires_limit_price(&self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit | Self::LimitOnClose)
    }
}

/// Broker-assigned order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Transmitted, not yet acknowledged by the broker.
    PendingSubmit,
    /// Cancel requested, not yet confirmed.
    PendingCancel,
    /// Accepted by the broker, held until elected for submission.
    PreSubmitted,
    /// Working at the exchange.
    Submitted,
    /// Cancelled by the API before the broker acknowledged it.
    ApiCancelled,
    /// Cancelled, confirmed by the exchange.
    Cancelled,
    /// Completely filled.
    Filled,
    /// Received but not working (rejected, or outside trading hours).
    Inactive,
}

impl OrderStatus {
    /// Convert from the gateway's status string.
    pub fn from_gateway_str(s: &str) -> Option<Self> {
        match s {
            "PendingSubmit" => Some(Self::PendingSubmit),
            "PendingCancel" => Some(Self::PendingCancel),
            "PreSubmitted" => Some(Self::PreSubmitted),
            "Submitted" => Some(Self::Submitted),
            "ApiCancelled" => Some(Self::ApiCancelled),
            "Cancelled" => Some(Self::Cancelled),
            "Filled" => Some(Self::Filled),
            "Inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    /// Convert to the gateway's status string.
    pub fn as_gateway_str(&self) -> &'static str {
        match self {
            Self::PendingSubmit => "PendingSubmit",
            Self::PendingCancel => "PendingCancel",
            Self::PreSubmitted => "PreSubmitted",
            Self::Submitted => "Submitted",
            Self::ApiCancelled => "ApiCancelled",
            Self::Cancelled => "Cancelled",
            Self::Filled => "Filled",
            Self::Inactive => "Inactive",
        }
    }

    /// Check if this is a terminal status (order is done).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::ApiCancelled | Self::Inactive
        )
    }

    /// Check if the order is still working or may still work.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::PendingSubmit | Self::PendingCancel | Self::PreSubmitted | Self::Submitted
        )
    }
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Valid for the current session.
    Day,
    /// Good Till Canceled.
    GTC,
    /// Immediate Or Cancel.
    IOC,
    /// Fill Or Kill.
    FOK,
}

impl TimeInForce {
    /// Convert from the gateway's string representation.
    pub fn from_gateway_str(s: &str) -> Option<Self> {
        match s {
            "DAY" => Some(Self::Day),
            "GTC" => Some(Self::GTC),
            "IOC" => Some(Self::IOC),
            "FOK" => Some(Self::FOK),
            _ => None,
        }
    }

    /// Convert to the gateway's string representation.
    pub fn as_gateway_str(&self) -> &'static str {
        match self {
            Self::Day => "DAY",
            Self::GTC => "GTC",
            Self::IOC => "IOC",
            Self::FOK => "FOK",
        }
    }
}
