//! Store wrappers that inject contention and failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ledger_domain::Balance;
use ledger_store::{
    InsertOutcome, Item, KeyValueStore, RecordStore, StoreError, Table, UpdateOutcome,
};
use rust_decimal::Decimal;

// =============================================================================
// ContendedStore
// =============================================================================

/// Loses the first `conflicts` balance compare-and-swaps.
///
/// Without a rival write the conditional update simply reports
/// `ConditionFailed`. With one, the rival's deltas are written to the inner
/// store first and the update is then delegated, so it fails for real and
/// the caller must re-read to see the rival's change.
pub struct ContendedStore<S: KeyValueStore> {
    inner: Arc<S>,
    remaining: AtomicU32,
    attempts: AtomicU32,
    rival: Option<(Decimal, Decimal)>,
}

impl<S: KeyValueStore> ContendedStore<S> {
    /// Force `conflicts` lost rounds on the Balances table.
    pub fn new(inner: Arc<S>, conflicts: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(conflicts),
            attempts: AtomicU32::new(0),
            rival: None,
        }
    }

    /// Apply these deltas to the stored balance on every forced conflict.
    pub fn with_rival_write(mut self, available_delta: Decimal, total_delta: Decimal) -> Self {
        self.rival = Some((available_delta, total_delta));
        self
    }

    /// Conditional updates seen on the Balances table.
    pub fn conditional_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn take_conflict(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn rival_write(&self, user_id: &str, deltas: (Decimal, Decimal)) -> Result<(), StoreError> {
        let current: Option<Balance> = self.inner.load(user_id).await?;
        let current = current.ok_or_else(|| StoreError::not_found("balance", user_id))?;

        let overflow = || StoreError::Backend(format!("rival write overflows balance {}", user_id));
        let available = current.available.checked_add(deltas.0).ok_or_else(overflow)?;
        let total = current.total.checked_add(deltas.1).ok_or_else(overflow)?;

        self.inner.save(&Balance::new(user_id, available, total)).await
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for ContendedStore<S> {
    async fn get(&self, table: Table, key: &str) -> Result<Option<Item>, StoreError> {
        self.inner.get(table, key).await
    }

    async fn put(&self, table: Table, key: &str, item: Item) -> Result<(), StoreError> {
        self.inner.put(table, key, item).await
    }

    async fn insert(&self, table: Table, key: &str, item: Item) -> Result<InsertOutcome, StoreError> {
        self.inner.insert(table, key, item).await
    }

    async fn conditional_update(
        &self,
        table: Table,
        key: &str,
        set: Item,
        expected: Item,
    ) -> Result<UpdateOutcome, StoreError> {
        if table == Table::Balances {
            self.attempts.fetch_add(1, Ordering::SeqCst);

            if self.take_conflict() {
                match self.rival {
                    Some(deltas) => self.rival_write(key, deltas).await?,
                    None => return Ok(UpdateOutcome::ConditionFailed),
                }
            }
        }

        self.inner.conditional_update(table, key, set, expected).await
    }
}

// =============================================================================
// FaultyStore
// =============================================================================

/// Store operation, for fault targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `get`
    Get,
    /// `put`
    Put,
    /// `insert`
    Insert,
    /// `conditional_update`
    ConditionalUpdate,
}

/// Fails chosen operations on chosen tables until healed.
pub struct FaultyStore<S: KeyValueStore> {
    inner: Arc<S>,
    /// Armed faults → calls to let through before failing
    faults: Mutex<HashMap<(Operation, Table), u32>>,
}

impl<S: KeyValueStore> FaultyStore<S> {
    /// Wrap a store with no faults armed.
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Fail every `operation` on `table` from now on.
    pub fn fail(&self, operation: Operation, table: Table) {
        self.fail_after(operation, table, 0);
    }

    /// Let `successes` calls through, then fail every `operation` on `table`.
    pub fn fail_after(&self, operation: Operation, table: Table, successes: u32) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert((operation, table), successes);
        }
    }

    /// Disarm a fault.
    pub fn heal(&self, operation: Operation, table: Table) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.remove(&(operation, table));
        }
    }

    fn check(&self, operation: Operation, table: Table) -> Result<(), StoreError> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| StoreError::Backend("fault table lock poisoned".to_string()))?;

        match faults.get_mut(&(operation, table)) {
            Some(0) => Err(StoreError::Backend(format!(
                "injected {:?} failure on {}",
                operation, table
            ))),
            Some(successes) => {
                *successes -= 1;
                Ok(())
            },
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for FaultyStore<S> {
    async fn get(&self, table: Table, key: &str) -> Result<Option<Item>, StoreError> {
        self.check(Operation::Get, table)?;
        self.inner.get(table, key).await
    }

    async fn put(&self, table: Table, key: &str, item: Item) -> Result<(), StoreError> {
        self.check(Operation::Put, table)?;
        self.inner.put(table, key, item).await
    }

    async fn insert(&self, table: Table, key: &str, item: Item) -> Result<InsertOutcome, StoreError> {
        self.check(Operation::Insert, table)?;
        self.inner.insert(table, key, item).await
    }

    async fn conditional_update(
        &self,
        table: Table,
        key: &str,
        set: Item,
        expected: Item,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check(Operation::ConditionalUpdate, table)?;
        self.inner.conditional_update(table, key, set, expected).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{read_balance, seed_balance};
    use ledger_store::{balance_amounts, MemoryStore};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_contended_store_forces_conflicts_then_delegates() {
        let inner = Arc::new(MemoryStore::new());
        seed_balance(inner.as_ref(), "u1", dec!(10), dec!(10)).await.unwrap();
        let store = ContendedStore::new(Arc::clone(&inner), 1);

        let set = balance_amounts(dec!(5), dec!(5)).unwrap();
        let expected = balance_amounts(dec!(10), dec!(10)).unwrap();

        let first = store
            .conditional_update(Table::Balances, "u1", set.clone(), expected.clone())
            .await
            .unwrap();
        let second = store.conditional_update(Table::Balances, "u1", set, expected).await.unwrap();

        assert_eq!(first, UpdateOutcome::ConditionFailed);
        assert_eq!(second, UpdateOutcome::Applied);
        assert_eq!(store.conditional_attempts(), 2);
    }

    #[tokio::test]
    async fn test_contended_store_rival_write_lands() {
        let inner = Arc::new(MemoryStore::new());
        seed_balance(inner.as_ref(), "u1", dec!(10), dec!(10)).await.unwrap();
        let store = ContendedStore::new(Arc::clone(&inner), 1).with_rival_write(dec!(1), dec!(2));

        let outcome = store
            .conditional_update(
                Table::Balances,
                "u1",
                balance_amounts(dec!(5), dec!(5)).unwrap(),
                balance_amounts(dec!(10), dec!(10)).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::ConditionFailed);
        let balance = read_balance(inner.as_ref(), "u1").await.unwrap().unwrap();
        assert_eq!(balance.available, dec!(11));
        assert_eq!(balance.total, dec!(12));
    }

    #[tokio::test]
    async fn test_contended_store_rival_overflow_is_backend_error() {
        let inner = Arc::new(MemoryStore::new());
        seed_balance(inner.as_ref(), "u1", Decimal::MAX, dec!(1)).await.unwrap();
        let store = ContendedStore::new(Arc::clone(&inner), 1).with_rival_write(dec!(1), dec!(0));

        let result = store
            .conditional_update(
                Table::Balances,
                "u1",
                balance_amounts(dec!(0), dec!(0)).unwrap(),
                balance_amounts(Decimal::MAX, dec!(1)).unwrap(),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
        let balance = read_balance(inner.as_ref(), "u1").await.unwrap().unwrap();
        assert_eq!(balance.available, Decimal::MAX);
    }

    #[tokio::test]
    async fn test_faulty_store_fail_after_and_heal() {
        let inner = Arc::new(MemoryStore::new());
        let store = FaultyStore::new(Arc::clone(&inner));
        store.fail_after(Operation::Get, Table::Orders, 1);

        assert!(store.get(Table::Orders, "o1").await.is_ok());
        assert!(matches!(store.get(Table::Orders, "o1").await, Err(StoreError::Backend(_))));
        // Other tables unaffected
        assert!(store.get(Table::Balances, "u1").await.is_ok());

        store.heal(Operation::Get, Table::Orders);
        assert!(store.get(Table::Orders, "o1").await.is_ok());
    }
}
