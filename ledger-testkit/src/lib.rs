//! Test helpers for ledger tests.
//!
//! Provides seeding/inspection helpers and store wrappers that force
//! compare-and-swap conflicts or fail chosen operations.

mod helpers;
mod stores;

pub use helpers::{init_tracing, read_balance, read_order, seed_balance};
pub use stores::{ContendedStore, FaultyStore, Operation};

/// Result type for test helpers.
pub type Result<T> = std::result::Result<T, anyhow::Error>;
