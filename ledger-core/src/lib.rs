//! Ledger Core
//!
//! Balance updates under optimistic concurrency, and the sell order
//! lifecycle built on top of them.
//!
//! # Architecture
//!
//! ```text
//! OrderWorkflow ──► Ledger ──► KeyValueStore (conditional update per key)
//!       │                              ▲
//!       └──────── order records ───────┘
//! ```
//!
//! # Components
//!
//! - **Ledger**: read/modify/compare-and-swap loop over one balance
//! - **OrderWorkflow**: create → settle saga, plus reconciliation
//! - **Retry policies**: unbounded spin or bounded exponential backoff
//! - **Config**: environment-based policy selection
//!
//! # Example
//!
//! ```rust,ignore
//! use ledger_core::{LedgerConfig, OrderWorkflow};
//! use ledger_store::MemoryStore;
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let workflow = OrderWorkflow::from_config(store, &LedgerConfig::from_env()?);
//!
//! workflow.ledger().open_account("u1", dec!(100), dec!(100)).await?;
//! workflow.create_sell_order("u1", "o1", dec!(40)).await?;
//! workflow.settle("o1").await?;
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod retry;
pub mod workflow;

// Re-exports for convenience
pub use config::{LedgerConfig, RetryConfig};
pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use policy::{FundsCheck, SettlementPolicy};
pub use retry::{ExponentialBackoff, RetryPolicy, Unbounded};
pub use workflow::{OrderWorkflow, Posting, ReconcileReport};
