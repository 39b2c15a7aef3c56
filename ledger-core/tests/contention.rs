//! Concurrent balance adjustments against one key.
//!
//! Run with: `cargo test -p ledger-core --test contention`

use std::sync::Arc;
use std::time::Duration;

use ledger_core::{ExponentialBackoff, Ledger, LedgerError, OrderWorkflow};
use ledger_store::MemoryStore;
use ledger_testkit::{init_tracing, read_balance, seed_balance};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const WRITERS: i64 = 16;
const ROUNDS: i64 = 25;

async fn seeded(available: Decimal, total: Decimal) -> Arc<MemoryStore> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    seed_balance(store.as_ref(), "u1", available, total).await.unwrap();
    store
}

/// No update is lost: final = initial + sum of deltas.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adjusts_sum_exactly() -> anyhow::Result<()> {
    let store = seeded(dec!(1000), dec!(1000)).await;
    let ledger = Ledger::new(Arc::clone(&store));

    let mut handles = Vec::new();
    for writer in 0..WRITERS {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..ROUNDS {
                // Even writers deposit 2/1, odd writers withdraw 1/1
                let (available, total) = if writer % 2 == 0 {
                    (dec!(2), dec!(1))
                } else {
                    (dec!(-1), dec!(-1))
                };
                ledger.adjust("u1", available, total).await?;
            }
            Ok::<_, LedgerError>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let half = Decimal::from(WRITERS / 2 * ROUNDS);
    let balance = read_balance(store.as_ref(), "u1").await?.expect("balance");
    assert_eq!(balance.available, dec!(1000) + half * dec!(2) - half);
    assert_eq!(balance.total, dec!(1000) + half - half);
    Ok(())
}

/// Racing withdrawals never take either field below zero.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_withdrawals_never_overdraw() -> anyhow::Result<()> {
    let store = seeded(dec!(30), dec!(30)).await;
    let ledger = Ledger::new(Arc::clone(&store));

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.adjust_both("u1", dec!(-7)).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await? {
            Ok(balance) => {
                assert!(balance.available >= Decimal::ZERO);
                assert!(balance.total >= Decimal::ZERO);
                succeeded += 1;
            },
            Err(LedgerError::NegativeBalance { .. }) => {},
            Err(other) => return Err(other.into()),
        }
    }

    // 30 / 7: exactly four withdrawals fit
    assert_eq!(succeeded, 4);
    let balance = read_balance(store.as_ref(), "u1").await?.expect("balance");
    assert_eq!(balance.available, dec!(2));
    assert_eq!(balance.total, dec!(2));
    Ok(())
}

/// Concurrent orders for one user each reserve exactly their amount.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_order_creation() -> anyhow::Result<()> {
    let store = seeded(dec!(100), dec!(100)).await;
    let workflow = Arc::new(OrderWorkflow::new(Arc::clone(&store)));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let workflow = Arc::clone(&workflow);
            tokio::spawn(async move {
                workflow.create_sell_order("u1", &format!("o{i}"), dec!(5)).await
            })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    let balance = read_balance(store.as_ref(), "u1").await?.expect("balance");
    assert_eq!(balance.available, dec!(50));
    assert_eq!(balance.total, dec!(50));
    Ok(())
}

/// Backoff with jitter still converges under contention.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_backoff_policy_converges() -> anyhow::Result<()> {
    let store = seeded(dec!(0), dec!(0)).await;
    let policy = ExponentialBackoff::new(Duration::from_micros(50), Duration::from_millis(2))
        .with_jitter();
    let ledger = Ledger::new(Arc::clone(&store)).with_retry_policy(Arc::new(policy));

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.adjust_both("u1", dec!(1.5)).await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    let balance = read_balance(store.as_ref(), "u1").await?.expect("balance");
    assert_eq!(balance.available, Decimal::from(WRITERS) * dec!(1.5));
    Ok(())
}
