//! Value Objects for the ledger domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation and record transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Amount must be positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// An adjustment would drive a balance field below zero
    #[error("Negative balance for {user_id}: available {available}, total {total}")]
    NegativeBalance {
        /// Owner of the balance
        user_id: String,
        /// Available funds the adjustment would have produced
        available: Decimal,
        /// Total funds the adjustment would have produced
        total: Decimal,
    },

    /// An adjustment would exceed the representable decimal range
    #[error("Balance overflow for {user_id}")]
    Overflow {
        /// Owner of the balance
        user_id: String,
    },

    /// Order has already reached the terminal status
    #[error("Order already settled: {0}")]
    AlreadySettled(String),

    /// Invalid state transition
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

// =============================================================================
// Amount
// =============================================================================

/// Amount represents a strictly positive decimal order amount
///
/// # Invariants
/// - Must be > 0
///
/// Deserialization goes through [`Amount::new`], so a stored record carrying a
/// non-positive amount fails to decode instead of producing an invalid order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Create a new Amount with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAmount` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidAmount(format!(
                "Amount must be positive, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
