//! Test helper functions for store seeding and inspection.

use std::sync::Once;

use ledger_domain::{Balance, Order};
use ledger_store::{KeyValueStore, RecordStore};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use crate::Result;

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to `ledger_core=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("ledger_core=debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Write a balance directly, bypassing the ledger.
///
/// Overwrites any existing balance for `user_id`.
pub async fn seed_balance<S>(
    store: &S,
    user_id: &str,
    available: Decimal,
    total: Decimal,
) -> Result<Balance>
where
    S: KeyValueStore + ?Sized,
{
    let balance = Balance::new(user_id, available, total);
    store.save(&balance).await?;
    Ok(balance)
}

/// Read a balance directly from the store.
pub async fn read_balance<S>(store: &S, user_id: &str) -> Result<Option<Balance>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(store.load(user_id).await?)
}

/// Read an order directly from the store.
pub async fn read_order<S>(store: &S, order_id: &str) -> Result<Option<Order>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(store.load(order_id).await?)
}
