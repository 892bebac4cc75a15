//! Aggregated view of one order.

use model::{ExecutionData, OpenOrder, OrderId, OrderStatus, OrderStatusUpdate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Everything the gateway has said about one order.
///
/// Created empty when the order is submitted; each field fills in as the
/// corresponding reply arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    /// Latest order acknowledgement.
    pub acknowledgement: Option<OpenOrder>,
    /// Latest status update.
    pub status: Option<OrderStatusUpdate>,
    /// Every execution report, in arrival order.
    pub executions: Vec<ExecutionData>,
}

impl OrderRecord {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            acknowledgement: None,
            status: None,
            executions: Vec::new(),
        }
    }

    /// Most recent known status, from the status update or else the acknowledgement.
    pub fn current_status(&self) -> Option<OrderStatus> {
        self.status
            .as_ref()
            .map(|s| s.status)
            .or_else(|| self.acknowledgement.as_ref().map(|a| a.status))
    }

    /// Total quantity across all execution reports.
    pub fn filled_quantity(&self) -> Decimal {
        self.executions.iter().map(|e| e.shares).sum()
    }

    /// Check if the order can no longer change state.
    pub fn is_terminal(&self) -> bool {
        self.current_status().is_some_and(|s| s.is_terminal())
    }
}
