//! Integration tests for the sell order lifecycle against the in-memory store.
//!
//! Run with: `cargo test -p ledger-core --test order_lifecycle`

use std::sync::Arc;

use ledger_core::{FundsCheck, LedgerError, OrderWorkflow, SettlementPolicy};
use ledger_domain::{Balance, FundsState, OrderStatus};
use ledger_store::{MemoryStore, Table};
use ledger_testkit::{init_tracing, read_balance, read_order, seed_balance};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

async fn setup(
    available: Decimal,
    total: Decimal,
    policy: SettlementPolicy,
) -> (Arc<MemoryStore>, OrderWorkflow<MemoryStore>) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    seed_balance(store.as_ref(), "u1", available, total).await.unwrap();
    let workflow = OrderWorkflow::new(Arc::clone(&store)).with_settlement_policy(policy);
    (store, workflow)
}

async fn balance(store: &MemoryStore) -> Balance {
    read_balance(store, "u1").await.unwrap().unwrap()
}

async fn stored_amount(store: &MemoryStore, order_id: &str) -> Decimal {
    read_order(store, order_id).await.unwrap().unwrap().amount.as_decimal()
}

/// Balance{100,100}; create o1 for 40 → order pending, balance {60,60}.
#[tokio::test]
async fn test_create_sell_order_reserves_funds() {
    let (store, workflow) = setup(dec!(100), dec!(100), SettlementPolicy::StatusOnly).await;

    workflow.create_sell_order("u1", "o1", dec!(40)).await.unwrap();

    let order = read_order(store.as_ref(), "o1").await.unwrap().unwrap();
    assert_eq!(order.order_id, "o1");
    assert_eq!(order.user_id, "u1");
    assert_eq!(order.amount.as_decimal(), dec!(40));
    assert_eq!(order.status, OrderStatus::Pending);

    assert_eq!(balance(&store).await, Balance::new("u1", dec!(60), dec!(60)));
}

/// Settlement that only flips status leaves the balance at {60,60}.
#[tokio::test]
async fn test_settle_status_only_leaves_balance() {
    let (store, workflow) = setup(dec!(100), dec!(100), SettlementPolicy::StatusOnly).await;
    workflow.create_sell_order("u1", "o1", dec!(40)).await.unwrap();

    let order = workflow.settle("o1").await.unwrap();

    assert_eq!(order.status, OrderStatus::Settled);
    assert_eq!(order.funds, FundsState::Reserved);
    assert_eq!(balance(&store).await, Balance::new("u1", dec!(60), dec!(60)));
}

/// Settlement that debits total takes the balance to {60,20}.
#[tokio::test]
async fn test_settle_debit_total() {
    let (store, workflow) = setup(dec!(100), dec!(100), SettlementPolicy::DebitTotal).await;
    workflow.create_sell_order("u1", "o1", dec!(40)).await.unwrap();

    let order = workflow.settle("o1").await.unwrap();

    assert_eq!(order.status, OrderStatus::Settled);
    assert_eq!(order.funds, FundsState::Finalized);
    assert_eq!(balance(&store).await, Balance::new("u1", dec!(60), dec!(20)));
}

/// Second settle fails and does not touch the balance again.
#[tokio::test]
async fn test_settle_twice_is_rejected() {
    for policy in [SettlementPolicy::StatusOnly, SettlementPolicy::DebitTotal] {
        let (store, workflow) = setup(dec!(100), dec!(100), policy).await;
        workflow.create_sell_order("u1", "o1", dec!(40)).await.unwrap();

        workflow.settle("o1").await.unwrap();
        let after_first = balance(&store).await;

        let err = workflow.settle("o1").await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadySettled(ref id) if id == "o1"));
        assert_eq!(balance(&store).await, after_first);
    }
}

#[tokio::test]
async fn test_settle_unknown_order() {
    let (_store, workflow) = setup(dec!(100), dec!(100), SettlementPolicy::StatusOnly).await;

    let err = workflow.settle("missing").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "order", .. }));
}

/// Zero and negative amounts are rejected with no records written.
#[tokio::test]
async fn test_non_positive_amount_rejected() {
    let (store, workflow) = setup(dec!(100), dec!(100), SettlementPolicy::StatusOnly).await;

    for amount in [Decimal::ZERO, dec!(-5)] {
        let err = workflow.create_sell_order("u1", "o1", amount).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }

    assert_eq!(store.item_count(Table::Orders), 0);
    assert_eq!(balance(&store).await, Balance::new("u1", dec!(100), dec!(100)));
}

/// Insufficient funds with the default funds check: nothing is written.
#[tokio::test]
async fn test_insufficient_funds_checked_before_write() {
    let (store, workflow) = setup(dec!(10), dec!(10), SettlementPolicy::StatusOnly).await;

    let err = workflow.create_sell_order("u1", "o2", dec!(50)).await.unwrap_err();

    assert!(matches!(err, LedgerError::NegativeBalance { .. }));
    assert!(read_order(store.as_ref(), "o2").await.unwrap().is_none());
    assert_eq!(balance(&store).await, Balance::new("u1", dec!(10), dec!(10)));
}

/// Insufficient funds without the check: the order is written first and
/// left pending with no reservation.
#[tokio::test]
async fn test_insufficient_funds_without_check_orphans_order() {
    let (store, workflow) = setup(dec!(10), dec!(10), SettlementPolicy::StatusOnly).await;
    let workflow = workflow.with_funds_check(FundsCheck::Skip);

    let err = workflow.create_sell_order("u1", "o2", dec!(50)).await.unwrap_err();
    assert!(matches!(err, LedgerError::NegativeBalance { .. }));

    let order = read_order(store.as_ref(), "o2").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.funds, FundsState::Unreserved);
    assert_eq!(balance(&store).await, Balance::new("u1", dec!(10), dec!(10)));

    // Reconciling still cannot reserve funds that are not there
    let err = workflow.reconcile("o2").await.unwrap_err();
    assert!(matches!(err, LedgerError::NegativeBalance { .. }));
}

/// The stored amount never changes across the lifecycle.
#[tokio::test]
async fn test_order_amount_is_immutable() {
    let (store, workflow) = setup(dec!(500), dec!(500), SettlementPolicy::DebitTotal).await;

    workflow.create_sell_order("u1", "o1", dec!(100)).await.unwrap();
    assert_eq!(stored_amount(&store, "o1").await, dec!(100));

    workflow.create_sell_order("u1", "o2", dec!(30)).await.unwrap();
    assert_eq!(stored_amount(&store, "o1").await, dec!(100));

    workflow.settle("o1").await.unwrap();
    assert_eq!(stored_amount(&store, "o1").await, dec!(100));

    let _ = workflow.settle("o1").await;
    workflow.reconcile("o1").await.unwrap();
    assert_eq!(stored_amount(&store, "o1").await, dec!(100));
}

/// Reusing an order id overwrites the stored order (last write wins).
#[tokio::test]
async fn test_reused_order_id_overwrites() {
    let (store, workflow) = setup(dec!(100), dec!(100), SettlementPolicy::StatusOnly).await;

    workflow.create_sell_order("u1", "o1", dec!(10)).await.unwrap();
    workflow.create_sell_order("u1", "o1", dec!(20)).await.unwrap();

    let order = read_order(store.as_ref(), "o1").await.unwrap().unwrap();
    assert_eq!(order.amount.as_decimal(), dec!(20));
    // Both reservations landed
    assert_eq!(balance(&store).await, Balance::new("u1", dec!(70), dec!(70)));
}

#[tokio::test]
async fn test_open_account_then_trade() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let workflow = OrderWorkflow::new(Arc::clone(&store));

    workflow.ledger().open_account("u9", dec!(25), dec!(25)).await.unwrap();
    workflow.create_sell_order("u9", "o9", dec!(25)).await.unwrap();

    let balance = workflow.ledger().fetch_balance("u9").await.unwrap();
    assert_eq!(balance.available, Decimal::ZERO);
    assert_eq!(balance.total, Decimal::ZERO);
    assert_eq!(balance.committed(), Decimal::ZERO);
}
