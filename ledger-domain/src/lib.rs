//! Ledger Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains the balance and order records and the rules for changing them.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{Balance, FundsState, Order, OrderId, OrderStatus, UserId};
pub use value_objects::{Amount, DomainError};
