//! Domain Entities for the ledger
//!
//! Balances and sell orders, with the rules that govern how they change.
//! Entities are plain records; persistence lives in `ledger-store`.

use crate::value_objects::{Amount, DomainError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unique identifier for a balance owner
pub type UserId = String;

/// Unique identifier for an Order
pub type OrderId = String;

// =============================================================================
// Balance
// =============================================================================

/// Per-user monetary balance
///
/// - `available`: funds free to commit to new orders
/// - `total`: net worth including committed funds
///
/// Neither field may be driven negative by an adjustment; see [`Balance::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Owner, and the record's key
    pub user_id: UserId,
    /// Funds free to commit to new orders
    pub available: Decimal,
    /// Net worth including committed funds
    pub total: Decimal,
}

impl Balance {
    /// Create a balance record
    pub fn new(user_id: impl Into<UserId>, available: Decimal, total: Decimal) -> Self {
        Self {
            user_id: user_id.into(),
            available,
            total,
        }
    }

    /// Compute the balance that results from applying both deltas.
    ///
    /// Pure: `self` is left untouched so callers can still use it as the
    /// expected value of a compare-and-swap.
    ///
    /// # Errors
    /// - `DomainError::Overflow` if either sum leaves the decimal range
    /// - `DomainError::NegativeBalance` if either field would drop below zero
    pub fn apply(&self, available_delta: Decimal, total_delta: Decimal) -> Result<Self, DomainError> {
        let overflow = || DomainError::Overflow {
            user_id: self.user_id.clone(),
        };
        let available = self.available.checked_add(available_delta).ok_or_else(overflow)?;
        let total = self.total.checked_add(total_delta).ok_or_else(overflow)?;

        if available < Decimal::ZERO || total < Decimal::ZERO {
            return Err(DomainError::NegativeBalance {
                user_id: self.user_id.clone(),
                available,
                total,
            });
        }

        Ok(Self {
            user_id: self.user_id.clone(),
            available,
            total,
        })
    }

    /// Funds committed to open orders (total - available)
    pub fn committed(&self) -> Decimal {
        self.total - self.available
    }
}

// =============================================================================
// Order
// =============================================================================

/// Order lifecycle status. `Settled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created, funds committed (or about to be)
    Pending,
    /// Settled exactly once; terminal
    Settled,
}

impl OrderStatus {
    /// Status name as stored
    pub fn name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Settled => "Settled",
        }
    }
}

/// How far an order's balance postings have progressed.
///
/// An order and its owner's balance live under different keys, so the order
/// write and the balance adjustment cannot be atomic. This field records which
/// balance postings are known to have landed:
///
/// ```text
/// Unreserved ──reserve──► Reserved ──finalize──► Finalized
/// ```
///
/// `Unreserved` on a persisted order means the creation debit has not been
/// confirmed. `Finalized` is only used when settlement also debits `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundsState {
    /// Order written, creation debit not yet confirmed
    Unreserved,
    /// Creation debit applied to available and total
    Reserved,
    /// Settlement debit applied to total
    Finalized,
}

/// A sell order
///
/// `amount` is fixed at creation; there is no setter for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID, and the record's key
    pub order_id: OrderId,
    /// Owner of the balance the order draws on
    pub user_id: UserId,
    /// Order amount, fixed at creation
    pub amount: Amount,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Balance postings confirmed so far
    pub funds: FundsState,

    // Audit
    /// When the order was created
    pub created_at: DateTime<Utc>,
    /// When the order was last written
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new pending sell order whose funds are not yet reserved
    pub fn new_sell(order_id: impl Into<OrderId>, user_id: impl Into<UserId>, amount: Amount) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.into(),
            user_id: user_id.into(),
            amount,
            status: OrderStatus::Pending,
            funds: FundsState::Unreserved,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if order is still pending
    pub fn is_pending(&self) -> bool {
        matches!(self.status, OrderStatus::Pending)
    }

    /// Check if order is settled
    pub fn is_settled(&self) -> bool {
        matches!(self.status, OrderStatus::Settled)
    }

    /// Transition Pending → Settled.
    ///
    /// # Errors
    /// Returns `DomainError::AlreadySettled` if the order is already settled.
    pub fn settle(&mut self) -> Result<(), DomainError> {
        if self.is_settled() {
            return Err(DomainError::AlreadySettled(self.order_id.clone()));
        }
        self.status = OrderStatus::Settled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record that the creation debit landed (Unreserved → Reserved).
    pub fn mark_reserved(&mut self) -> Result<(), DomainError> {
        if self.funds != FundsState::Unreserved {
            return Err(DomainError::InvalidStateTransition(format!(
                "order {}: cannot reserve funds from {:?}",
                self.order_id, self.funds
            )));
        }
        self.funds = FundsState::Reserved;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record that the settlement debit landed (Reserved → Finalized).
    ///
    /// Only a settled order can be finalized.
    pub fn mark_finalized(&mut self) -> Result<(), DomainError> {
        if !self.is_settled() || self.funds != FundsState::Reserved {
            return Err(DomainError::InvalidStateTransition(format!(
                "order {}: cannot finalize funds from {:?} while {}",
                self.order_id,
                self.funds,
                self.status.name()
            )));
        }
        self.funds = FundsState::Finalized;
        self.updated_at = Utc::now();
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
