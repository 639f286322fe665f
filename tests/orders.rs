mod common;

use common::{deterministic_config, spawn_engine};
use harvest_exchange::engine::types::{OrderType, Side};

async fn running_pair(duration: u64) -> (harvest_exchange::engine::EngineHandle, uuid::Uuid, uuid::Uuid) {
    let engine = spawn_engine(deterministic_config(duration));
    engine.create_session().await.unwrap();
    let alice = engine.join("alice".to_string()).await.unwrap();
    let bob = engine.join("bob".to_string()).await.unwrap();
    engine.start(alice.id).await.unwrap();
    (engine, alice.id, bob.id)
}

#[tokio::test]
async fn orders_are_rejected_before_session_is_running() {
    let engine = spawn_engine(deterministic_config(300));
    engine.create_session().await.unwrap();
    let alice = engine.join("alice".to_string()).await.unwrap();

    let err = engine
        .submit_order(alice.id, "bread".to_string(), Side::Sell, OrderType::Limit, 1, Some(3))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "session_not_running");
}

#[tokio::test]
async fn unknown_product_is_rejected() {
    let (engine, alice, _bob) = running_pair(300).await;

    let err = engine
        .submit_order(alice, "gold".to_string(), Side::Sell, OrderType::Limit, 1, Some(3))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unknown_product");
}

#[tokio::test]
async fn limit_orders_cross_and_settle_through_the_actor() {
    let (engine, alice, bob) = running_pair(300).await;

    let (sell_order, trades) = engine
        .submit_order(alice, "bread".to_string(), Side::Sell, OrderType::Limit, 3, Some(4))
        .await
        .unwrap();
    assert!(trades.is_empty());
    assert_eq!(sell_order.remaining_qty, 3);

    let (buy_order, trades) = engine
        .submit_order(bob, "bread".to_string(), Side::Buy, OrderType::Limit, 3, Some(4))
        .await
        .unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].qty, 3);
    assert_eq!(trades[0].price, 4);
    assert_eq!(buy_order.remaining_qty, 0);
}

#[tokio::test]
async fn cancel_requires_ownership() {
    let (engine, alice, bob) = running_pair(300).await;

    let (order, _) = engine
        .submit_order(alice, "bread".to_string(), Side::Sell, OrderType::Limit, 1, Some(5))
        .await
        .unwrap();

    let err = engine.cancel_order(bob, order.id).await.unwrap_err();
    assert_eq!(err.code(), "not_owner");

    engine.cancel_order(alice, order.id).await.unwrap();
    let err = engine.cancel_order(alice, order.id).await.unwrap_err();
    assert_eq!(err.code(), "already_terminal");
}

#[tokio::test]
async fn self_trade_is_prevented_through_the_actor() {
    let (engine, alice, _bob) = running_pair(300).await;

    engine
        .submit_order(alice, "bread".to_string(), Side::Sell, OrderType::Limit, 1, Some(3))
        .await
        .unwrap();
    let (order, trades) = engine
        .submit_order(alice, "bread".to_string(), Side::Buy, OrderType::Limit, 1, Some(3))
        .await
        .unwrap();

    assert!(trades.is_empty());
    assert_eq!(order.remaining_qty, 1);
}

#[tokio::test]
async fn disconnect_sweeps_open_orders() {
    let (engine, alice, _bob) = running_pair(300).await;

    let (order, _) = engine
        .submit_order(alice, "bread".to_string(), Side::Sell, OrderType::Limit, 1, Some(9))
        .await
        .unwrap();

    engine.disconnect(alice);
    // disconnect is fire-and-forget; give the actor a moment to process it.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let err = engine.cancel_order(alice, order.id).await.unwrap_err();
    assert_eq!(err.code(), "already_terminal");
}
