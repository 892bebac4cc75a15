//! End-to-end manager scenarios against the loopback engine.

use std::collections::HashMap;
use std::sync::Arc;

use common::{ManagerConfig, SubscriptionStrategy};
use engine_core::{EngineError, LoopbackEngine, REQUEST_ID_BASE};
use manager_core::ManagerError;
use managers::{AccountManager, OrderManager, RealtimeBarManager};
use model::{
    AccountDownloadEnd, AccountValue, AccountValueKey, Diagnostic, ExecutionData, OpenOrder,
    OrderId, OrderSide, OrderStatus, OrderStatusUpdate, OrderType, PlaceOrder, PortfolioValue,
    PortfolioValueKey, RealtimeBar, Reply, RequestId, RequestRealtimeBars, TimeInForce,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Wait until `processed` reports at least `replies` merged replies.
async fn settle(processed: impl Fn() -> u64, replies: u64) {
    while processed() < replies {
        tokio::task::yield_now().await;
    }
}

fn ack(order_id: OrderId) -> Reply {
    Reply::Acknowledgement(OpenOrder {
        order_id,
        account: "DU1".into(),
        symbol: "AAPL".into(),
        side: OrderSide::Buy,
        order_type: OrderType::Limit,
        quantity: dec!(100),
        limit_price: Some(dec!(190)),
        time_in_force: TimeInForce::Day,
        status: OrderStatus::Submitted,
    })
}

fn status(order_id: OrderId, status: OrderStatus, filled: Decimal) -> Reply {
    Reply::Status(OrderStatusUpdate {
        order_id,
        status,
        filled,
        remaining: dec!(100) - filled,
        avg_fill_price: dec!(190),
        last_fill_price: dec!(190),
        why_held: String::new(),
    })
}

fn execution(order_id: OrderId, exec_id: &str, shares: Decimal) -> Reply {
    Reply::Execution(ExecutionData {
        order_id,
        exec_id: exec_id.into(),
        account: "DU1".into(),
        symbol: "AAPL".into(),
        side: OrderSide::Buy,
        shares,
        price: dec!(190),
        cumulative_qty: shares,
        avg_price: dec!(190),
        time: "20240102 10:00:00".into(),
    })
}

fn limit_order(order_id: OrderId) -> PlaceOrder {
    PlaceOrder::limit("AAPL", OrderSide::Buy, dec!(100), dec!(190)).with_order_id(order_id)
}

#[tokio::test]
async fn order_42_lifecycle() {
    common::try_init_logging();
    let engine = LoopbackEngine::shared();
    let manager = OrderManager::new(engine.clone(), ManagerConfig::for_orders()).unwrap();

    manager.send_order(limit_order(42)).unwrap();
    assert_eq!(manager.all_data().len(), 1);
    let first = manager.new_data();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].order_id, 42);

    engine.deliver(status(42, OrderStatus::Filled, dec!(100)));
    settle(|| manager.processed(), 1).await;

    let changed = manager.new_data();
    assert_eq!(changed.len(), 1);
    assert_eq!(
        changed[0].status.as_ref().map(|s| s.status),
        Some(OrderStatus::Filled)
    );
    assert!(manager.new_data().is_empty());

    engine.deliver(execution(42, "e1", dec!(50)));
    engine.deliver(execution(42, "e2", dec!(50)));
    settle(|| manager.processed(), 3).await;

    let record = manager.order(42).unwrap();
    assert_eq!(record.executions.len(), 2);
    assert_eq!(record.executions[0].exec_id, "e1");
    assert_eq!(record.filled_quantity(), dec!(100));

    manager.close().await;
}

#[tokio::test]
async fn interleaved_replies_one_record_per_id() {
    let engine = LoopbackEngine::shared();
    let manager = OrderManager::new(engine.clone(), ManagerConfig::for_orders()).unwrap();
    for id in [3, 1, 2] {
        manager.send_order(limit_order(id)).unwrap();
    }

    let replies = vec![
        ack(1),
        execution(2, "b1", dec!(10)),
        status(3, OrderStatus::PreSubmitted, dec!(0)),
        execution(1, "a1", dec!(20)),
        ack(2),
        execution(2, "b2", dec!(30)),
        execution(1, "a2", dec!(5)),
        status(1, OrderStatus::Submitted, dec!(25)),
        execution(2, "b3", dec!(60)),
    ];
    let count = replies.len() as u64;
    for reply in replies {
        engine.deliver(reply);
    }
    settle(|| manager.processed(), count).await;

    let all = manager.all_data();
    let ids: Vec<OrderId> = all.iter().map(|r| r.order_id).collect();
    assert_eq!(ids, vec![3, 1, 2]);

    let exec_ids: HashMap<OrderId, Vec<String>> = all
        .iter()
        .map(|r| {
            (
                r.order_id,
                r.executions.iter().map(|e| e.exec_id.clone()).collect(),
            )
        })
        .collect();
    assert_eq!(exec_ids[&1], vec!["a1", "a2"]);
    assert_eq!(exec_ids[&2], vec!["b1", "b2", "b3"]);
    assert!(exec_ids[&3].is_empty());

    manager.close().await;
}

#[tokio::test]
async fn repeated_updates_coalesce() {
    let engine = LoopbackEngine::shared();
    let manager = OrderManager::new(engine.clone(), ManagerConfig::for_orders()).unwrap();
    manager.send_order(limit_order(7)).unwrap();
    manager.send_order(limit_order(8)).unwrap();
    manager.new_data();

    engine.deliver(status(7, OrderStatus::Submitted, dec!(0)));
    engine.deliver(status(7, OrderStatus::Submitted, dec!(40)));
    engine.deliver(status(7, OrderStatus::Filled, dec!(100)));
    settle(|| manager.processed(), 3).await;

    let changed = manager.new_data();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].order_id, 7);
    assert_eq!(changed[0].status.as_ref().map(|s| s.filled), Some(dec!(100)));
    assert!(manager.new_data().is_empty());

    manager.close().await;
}

#[tokio::test]
async fn rejected_send_leaves_no_trace() {
    let engine = LoopbackEngine::shared();
    let manager = OrderManager::new(engine.clone(), ManagerConfig::for_orders()).unwrap();
    manager.send_order(limit_order(1)).unwrap();
    let before = manager.all_data();

    engine.reject_next_send(EngineError::Rejected("margin".into()));
    let result = manager.send_order(limit_order(2));

    assert_eq!(
        result,
        Err(ManagerError::Submission(EngineError::Rejected(
            "margin".into()
        )))
    );
    assert_eq!(manager.all_data(), before);
    assert_eq!(engine.router().subscriber_count(2), 0);
    assert!(manager.order(2).is_none());

    manager.close().await;
}

#[tokio::test]
async fn batch_stops_at_first_rejection() {
    let engine = LoopbackEngine::shared();
    let manager = OrderManager::new(engine.clone(), ManagerConfig::for_orders()).unwrap();

    let ids = manager
        .send_orders([limit_order(1), limit_order(2)])
        .unwrap();
    assert_eq!(ids, vec![1, 2]);

    engine.set_connected(false);
    assert!(manager.send_orders([limit_order(3)]).is_err());
    assert_eq!(manager.all_data().len(), 2);

    manager.close().await;
}

#[tokio::test]
async fn teardown_unsubscribes_each_id_once() {
    let engine = LoopbackEngine::shared();
    let manager = OrderManager::new(engine.clone(), ManagerConfig::for_orders()).unwrap();
    manager.send_order(limit_order(5)).unwrap();
    manager.send_order(limit_order(6)).unwrap();

    engine.deliver(ack(5));
    engine.deliver(status(5, OrderStatus::Submitted, dec!(0)));
    engine.deliver(execution(5, "x1", dec!(100)));
    settle(|| manager.processed(), 3).await;

    manager.close().await;
    manager.close().await;

    let mut ids: Vec<i64> = engine
        .unsubscribe_calls()
        .into_iter()
        .map(|(_, id)| id)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![5, 6]);
    assert_eq!(manager.metrics().unsubscribes(), 2);
}

#[tokio::test]
async fn warnings_never_surface() {
    let engine = LoopbackEngine::shared();
    let manager = OrderManager::new(engine.clone(), ManagerConfig::for_orders()).unwrap();
    manager.send_order(limit_order(9)).unwrap();
    manager.new_data();

    engine.deliver(Reply::Diagnostic(Diagnostic::new(
        9,
        2109,
        "Order Event Warning: attribute outside RTH ignored",
    )));
    engine.deliver(Reply::Diagnostic(Diagnostic::new(9, 2137, "cross side warning")));
    settle(|| manager.processed(), 2).await;

    assert!(manager.is_running());
    assert!(manager.error().is_none());
    assert!(manager.new_data().is_empty());
    assert_eq!(manager.all_data().len(), 1);
    assert_eq!(manager.metrics().warnings_swallowed(), 2);

    manager.close().await;
}

#[tokio::test]
async fn managers_are_isolated() {
    let engine = LoopbackEngine::shared();
    let a = OrderManager::new(engine.clone(), ManagerConfig::for_orders()).unwrap();
    let b = OrderManager::new(engine.clone(), ManagerConfig::for_orders()).unwrap();
    a.send_order(limit_order(1)).unwrap();
    b.send_order(limit_order(2)).unwrap();
    let mut a_errors = a.errors();

    engine.deliver(Reply::Diagnostic(Diagnostic::new(1, 201, "Order rejected")));
    engine.deliver(status(2, OrderStatus::Submitted, dec!(0)));
    a_errors.changed().await.unwrap();
    settle(|| b.processed(), 1).await;

    assert!(a.error().is_some());
    assert!(b.error().is_none());
    assert!(b.is_running());
    assert!(b.order(1).is_none());

    a.close().await;
    b.close().await;
}

fn account_value(key: &str, value: &str) -> Reply {
    Reply::AccountValue(AccountValue {
        key: AccountValueKey::new("DU1", key, "USD"),
        value: value.into(),
    })
}

#[tokio::test]
async fn account_download_then_live_update() {
    let engine: Arc<LoopbackEngine> = LoopbackEngine::shared();
    let manager = AccountManager::new(engine.clone(), "DU1", ManagerConfig::for_account()).unwrap();

    for (key, value) in [
        ("NetLiquidation", "100000"),
        ("TotalCashValue", "40000"),
        ("BuyingPower", "160000"),
        ("GrossPositionValue", "60000"),
        ("AvailableFunds", "40000"),
    ] {
        engine.deliver(account_value(key, value));
    }
    engine.deliver(Reply::PortfolioValue(PortfolioValue {
        key: PortfolioValueKey {
            account_code: "DU1".into(),
            contract_id: 265598,
        },
        symbol: "AAPL".into(),
        position: dec!(300),
        market_price: dec!(200),
        market_value: dec!(60000),
        average_cost: dec!(180),
        unrealized_pnl: dec!(6000),
        realized_pnl: dec!(0),
    }));
    engine.deliver(Reply::AccountDownloadEnd(AccountDownloadEnd {
        account_code: "DU1".into(),
    }));
    engine.deliver(account_value("ExcessLiquidity", "35000"));
    settle(|| manager.processed(), 8).await;

    assert!(manager.is_loaded());
    assert_eq!(manager.values().len(), 6);
    assert_eq!(manager.portfolio().len(), 1);

    let fresh = manager.new_values();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].key.key, "ExcessLiquidity");
    assert!(manager.new_portfolio().is_empty());
    assert!(manager.new_values().is_empty());

    manager.close().await;
}

fn bar(request_id: RequestId, time: i64) -> Reply {
    Reply::RealtimeBar(RealtimeBar {
        request_id,
        time,
        open: dec!(190),
        high: dec!(191),
        low: dec!(189.5),
        close: dec!(190.5),
        volume: dec!(800),
        wap: dec!(190.2),
        count: 9,
    })
}

fn all_replies() -> ManagerConfig {
    ManagerConfig {
        subscription: SubscriptionStrategy::All,
        ..ManagerConfig::for_orders()
    }
}

#[tokio::test]
async fn subscribe_all_teardown_releases_seen_ids_and_catch_all() {
    let engine = LoopbackEngine::shared();
    let manager = OrderManager::new(engine.clone(), all_replies()).unwrap();
    assert_eq!(engine.router().catch_all_count(), 1);

    manager.send_order(limit_order(5)).unwrap();
    assert_eq!(engine.router().subscriber_count(5), 0);

    engine.deliver(status(5, OrderStatus::Submitted, dec!(0)));
    engine.deliver(ack(6));
    engine.deliver(account_value("NetLiquidation", "100000"));
    settle(|| manager.processed(), 3).await;
    assert_eq!(
        manager.all_data().iter().map(|r| r.order_id).collect::<Vec<_>>(),
        vec![5, 6]
    );

    manager.close().await;
    manager.close().await;

    let mut ids: Vec<i64> = engine
        .unsubscribe_calls()
        .into_iter()
        .map(|(_, id)| id)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![5, 6]);
    assert_eq!(engine.router().catch_all_count(), 0);
    assert_eq!(manager.send_order(limit_order(7)), Err(ManagerError::Closed));
    assert_eq!(engine.deliver(ack(5)), 0);
}

#[tokio::test]
async fn mixed_managers_share_one_engine() {
    let engine = LoopbackEngine::shared();
    let orders = OrderManager::new(engine.clone(), ManagerConfig::for_orders()).unwrap();
    let bars = RealtimeBarManager::new(
        engine.clone(),
        RequestRealtimeBars::trades("AAPL"),
        ManagerConfig::for_realtime_bars(),
    )
    .unwrap();
    let account = AccountManager::new(
        engine.clone(),
        "DU1",
        ManagerConfig {
            subscription: SubscriptionStrategy::All,
            ..ManagerConfig::for_account()
        },
    )
    .unwrap();

    let order_id = orders
        .send_order(PlaceOrder::limit("AAPL", OrderSide::Buy, dec!(100), dec!(190)))
        .unwrap();
    let request_id = bars.request_id();
    assert!(request_id >= REQUEST_ID_BASE);
    assert_ne!(order_id, request_id);

    let mut order_errors = orders.errors();
    engine.deliver(bar(request_id, 1_700_000_000));
    engine.deliver(status(order_id, OrderStatus::Submitted, dec!(0)));
    engine.deliver(Reply::Diagnostic(Diagnostic::new(order_id, 201, "Order rejected")));
    engine.deliver(account_value("NetLiquidation", "100000"));

    order_errors.changed().await.unwrap();
    settle(|| bars.processed(), 1).await;
    settle(|| account.processed(), 4).await;

    assert!(matches!(
        orders.error(),
        Some(ManagerError::Diagnostic { code: 201, .. })
    ));
    assert!(bars.is_running());
    assert!(bars.error().is_none());
    assert_eq!(bars.item().map(|b| b.time), Some(1_700_000_000));
    assert!(account.is_running());
    assert!(account.error().is_none());
    assert_eq!(account.values().len(), 1);

    orders.close().await;
    bars.close().await;
    account.close().await;
    assert_eq!(engine.router().catch_all_count(), 0);
    assert_eq!(engine.router().subscriber_count(order_id), 0);
    assert_eq!(engine.router().subscriber_count(request_id), 0);
}
