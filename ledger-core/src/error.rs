//! Ledger layer error types.

use ledger_domain::DomainError;
use ledger_store::StoreError;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by `Ledger` and `OrderWorkflow`.
///
/// Compare-and-swap conflicts never appear here: they are retried inside
/// `Ledger::adjust`.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No record for a required key
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (balance, order)
        entity: &'static str,
        /// Key that was looked up
        id: String,
    },

    /// Order amount must be positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The adjustment would drive available or total below zero
    #[error("Negative balance for {user_id}: available would be {available}, total would be {total}")]
    NegativeBalance {
        /// Owner of the balance
        user_id: String,
        /// Resulting available funds that were rejected
        available: Decimal,
        /// Resulting total funds that were rejected
        total: Decimal,
    },

    /// The adjustment would exceed the representable decimal range
    #[error("Balance overflow for {user_id}")]
    Overflow {
        /// Owner of the balance
        user_id: String,
    },

    /// Order is already settled (idempotency guard)
    #[error("Order already settled: {0}")]
    AlreadySettled(String),

    /// Balance already provisioned for this user
    #[error("Account already exists: {0}")]
    AccountExists(String),

    /// Caller named a different owner than the one recorded on the order
    #[error("Order {order_id} belongs to {owner}, not {caller}")]
    OwnerMismatch {
        /// Order being settled
        order_id: String,
        /// Owner recorded on the order
        owner: String,
        /// Owner the caller supplied
        caller: String,
    },

    /// Order was written but its creation debit never landed; reconcile first
    #[error("Order {order_id} has no confirmed funds reservation")]
    ReservationMissing {
        /// Order with the missing reservation
        order_id: String,
    },

    /// The operation deadline passed while retrying
    #[error("Timed out after {elapsed:?} adjusting balance for {user_id}")]
    Timeout {
        /// Balance owner
        user_id: String,
        /// Configured deadline
        elapsed: Duration,
    },

    /// The retry policy gave up on a contended balance
    #[error("Gave up adjusting balance for {user_id} after {attempts} conflicting attempts")]
    RetriesExhausted {
        /// Balance owner
        user_id: String,
        /// Number of attempts that lost the compare-and-swap
        attempts: u32,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record-level state machine violation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Create a not found error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidAmount(msg) => LedgerError::InvalidAmount(msg),
            DomainError::NegativeBalance { user_id, available, total } => {
                LedgerError::NegativeBalance { user_id, available, total }
            },
            DomainError::Overflow { user_id } => LedgerError::Overflow { user_id },
            DomainError::AlreadySettled(order_id) => LedgerError::AlreadySettled(order_id),
            DomainError::InvalidStateTransition(msg) => LedgerError::InvalidState(msg),
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
