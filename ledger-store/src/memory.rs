//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! Thread-safe using RwLock for concurrent access; every operation holds the
//! table lock for its whole duration, so each key is linearizable.

use crate::error::StoreError;
use crate::repository::{InsertOutcome, Item, KeyValueStore, Table, UpdateOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Items = HashMap<String, Item>;

/// In-memory store for testing
pub struct MemoryStore {
    balances: RwLock<Items>,
    orders: RwLock<Items>,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
            orders: RwLock::new(HashMap::new()),
        }
    }

    /// Get the number of items in a table
    pub fn item_count(&self, table: Table) -> usize {
        self.read(table).map(|items| items.len()).unwrap_or(0)
    }

    /// Clear all data (useful for test setup)
    pub fn clear(&self) -> Result<(), StoreError> {
        self.write(Table::Balances)?.clear();
        self.write(Table::Orders)?.clear();
        Ok(())
    }

    fn lock(&self, table: Table) -> &RwLock<Items> {
        match table {
            Table::Balances => &self.balances,
            Table::Orders => &self.orders,
        }
    }

    fn read(&self, table: Table) -> Result<RwLockReadGuard<'_, Items>, StoreError> {
        self.lock(table)
            .read()
            .map_err(|_| StoreError::Backend(format!("{} table lock poisoned", table)))
    }

    fn write(&self, table: Table) -> Result<RwLockWriteGuard<'_, Items>, StoreError> {
        self.lock(table)
            .write()
            .map_err(|_| StoreError::Backend(format!("{} table lock poisoned", table)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, table: Table, key: &str) -> Result<Option<Item>, StoreError> {
        let items = self.read(table)?;
        Ok(items.get(key).cloned())
    }

    async fn put(&self, table: Table, key: &str, item: Item) -> Result<(), StoreError> {
        let mut items = self.write(table)?;
        items.insert(key.to_string(), item);
        Ok(())
    }

    async fn insert(&self, table: Table, key: &str, item: Item) -> Result<InsertOutcome, StoreError> {
        let mut items = self.write(table)?;
        if items.contains_key(key) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        items.insert(key.to_string(), item);
        Ok(InsertOutcome::Inserted)
    }

    async fn conditional_update(
        &self,
        table: Table,
        key: &str,
        set: Item,
        expected: Item,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut items = self.write(table)?;
        let Some(stored) = items.get_mut(key) else {
            return Ok(UpdateOutcome::ConditionFailed);
        };

        if !expected.iter().all(|(name, value)| stored.get(name) == Some(value)) {
            return Ok(UpdateOutcome::ConditionFailed);
        }

        stored.extend(set);
        Ok(UpdateOutcome::Applied)
    }
}

// =============================================================================
// Tests
// =============================================================================
