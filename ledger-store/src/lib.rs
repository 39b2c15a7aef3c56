//! Ledger Storage Layer
//!
//! Provides persistence for balances and orders over a point-operation
//! key-value store.
//!
//! # Architecture
//!
//! - **Store port**: `KeyValueStore` (get, put, insert, conditional update)
//! - **Records**: typed marshaling of domain records to attribute maps
//! - **In-memory store**: Fast implementation for testing
//! - **PostgreSQL store**: Production implementation (feature `postgres`)
//!
//! # Usage
//!
//! ```rust
//! use ledger_domain::Balance;
//! use ledger_store::{MemoryStore, RecordStore};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!
//!     store.save(&Balance::new("u1", Decimal::from(100), Decimal::from(100))).await.unwrap();
//!
//!     let balance: Option<Balance> = store.load("u1").await.unwrap();
//!     println!("Balance: {:?}", balance);
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod record;
mod repository;

// Re-exports
pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgKeyValueStore;
pub use record::{balance_amounts, from_item, to_item, Record, RecordStore};
pub use repository::{InsertOutcome, Item, KeyValueStore, Table, UpdateOutcome};
