//! Key-value store port
//!
//! The ledger only needs point operations on a single key per record:
//! read, unconditional upsert, put-if-absent, and a conditional update that
//! applies only when the stored attributes still match what the caller read.
//! Implementations can be PostgreSQL, in-memory, or a fault-injecting wrapper.

use crate::error::StoreError;
use async_trait::async_trait;
use std::fmt;

/// A stored record: attribute name → value.
///
/// Decimals are carried as strings, so attribute equality is exact.
pub type Item = serde_json::Map<String, serde_json::Value>;

/// Logical tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Per-user balances, keyed by `user_id`
    Balances,
    /// Sell orders, keyed by `order_id`
    Orders,
}

impl Table {
    /// Table name as stored
    pub fn name(&self) -> &'static str {
        match self {
            Table::Balances => "Balances",
            Table::Orders => "Orders",
        }
    }

    /// Primary key attribute of the table's items
    pub fn key_attribute(&self) -> &'static str {
        match self {
            Table::Balances => "user_id",
            Table::Orders => "order_id",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a conditional update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The condition held and the new attributes were written
    Applied,
    /// The stored item no longer matches the expected attributes (or is gone)
    ConditionFailed,
}

/// Result of a put-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The item was written
    Inserted,
    /// An item already existed under the key; nothing was written
    AlreadyExists,
}

/// Point-operation key-value store.
///
/// Implementations must give read-your-writes on a single key and must apply
/// `conditional_update` atomically per key: of two racing updates carrying the
/// same expected attributes, at most one is `Applied`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read an item by key
    async fn get(&self, table: Table, key: &str) -> Result<Option<Item>, StoreError>;

    /// Write an item, replacing whatever is stored (last write wins)
    async fn put(&self, table: Table, key: &str, item: Item) -> Result<(), StoreError>;

    /// Write an item only if nothing is stored under the key
    async fn insert(&self, table: Table, key: &str, item: Item) -> Result<InsertOutcome, StoreError>;

    /// Merge `set` into the stored item if every attribute in `expected`
    /// equals the stored attribute.
    ///
    /// A missing item fails the condition. An empty `expected` merges
    /// unconditionally into an existing item.
    async fn conditional_update(
        &self,
        table: Table,
        key: &str,
        set: Item,
        expected: Item,
    ) -> Result<UpdateOutcome, StoreError>;
}
