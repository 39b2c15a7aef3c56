//! OrderWorkflow: sell order lifecycle sequenced with balance adjustments.
//!
//! An order and its owner's balance are different keys, so creating or
//! settling an order is a two-step saga with no cross-key atomicity:
//!
//! ```text
//! create:  write order (Pending, Unreserved) ─► adjust(-amount, -amount) ─► mark Reserved
//! settle:  write order (Settled)             ─► [DebitTotal] adjust(0, -amount) ─► mark Finalized
//! ```
//!
//! A failure between the two steps leaves the order in the intermediate
//! `FundsState` it was written with. Nothing is compensated; `reconcile`
//! re-drives the missing balance posting.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use ledger_domain::{Amount, FundsState, Order};
use ledger_store::{to_item, Item, KeyValueStore, RecordStore, Table, UpdateOutcome};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::policy::{FundsCheck, SettlementPolicy};

/// Attributes written when an order's status changes.
const STATUS_FIELDS: [&str; 2] = ["status", "updated_at"];

/// Attributes written when a balance posting is confirmed.
const FUNDS_FIELDS: [&str; 2] = ["funds", "updated_at"];

/// A balance posting re-driven by [`OrderWorkflow::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posting {
    /// Creation debit of available and total
    Reservation,
    /// Settlement debit of total (`SettlementPolicy::DebitTotal` only)
    SettlementDebit,
}

/// Outcome of reconciling one order.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    /// Order as stored after reconciliation
    pub order: Order,
    /// Postings applied by this call, in order; empty when already in sync
    pub applied: Vec<Posting>,
}

impl ReconcileReport {
    /// True if nothing needed re-driving.
    pub fn in_sync(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Owns the order record lifecycle.
pub struct OrderWorkflow<S: KeyValueStore + ?Sized> {
    /// Store holding the Orders table
    store: Arc<S>,
    /// Balance updates
    ledger: Ledger<S>,
    /// What settlement does to the balance
    settlement: SettlementPolicy,
    /// Whether creation checks funds before writing the order
    funds_check: FundsCheck,
}

impl<S: KeyValueStore + ?Sized> OrderWorkflow<S> {
    /// Create a workflow with default policies and an unbounded-retry ledger.
    pub fn new(store: Arc<S>) -> Self {
        let ledger = Ledger::new(Arc::clone(&store));
        Self {
            store,
            ledger,
            settlement: SettlementPolicy::default(),
            funds_check: FundsCheck::default(),
        }
    }

    /// Create a workflow from configuration.
    pub fn from_config(store: Arc<S>, config: &LedgerConfig) -> Self {
        let ledger = Ledger::from_config(Arc::clone(&store), config);
        Self {
            store,
            ledger,
            settlement: config.settlement,
            funds_check: config.funds_check,
        }
    }

    /// Replace the ledger used for balance adjustments.
    pub fn with_ledger(mut self, ledger: Ledger<S>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Set the settlement policy.
    pub fn with_settlement_policy(mut self, policy: SettlementPolicy) -> Self {
        self.settlement = policy;
        self
    }

    /// Set the funds check.
    pub fn with_funds_check(mut self, check: FundsCheck) -> Self {
        self.funds_check = check;
        self
    }

    /// Get the ledger.
    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    /// Get the settlement policy.
    pub fn settlement_policy(&self) -> SettlementPolicy {
        self.settlement
    }

    /// Read an order by ID.
    pub async fn fetch_order(&self, order_id: &str) -> LedgerResult<Order> {
        let order: Option<Order> = self.store.load(order_id).await?;
        order.ok_or_else(|| LedgerError::not_found("order", order_id))
    }

    /// Create a pending sell order and reserve its amount from the owner's
    /// available and total funds.
    ///
    /// The order write is unconditional: reusing an `order_id` overwrites
    /// the stored order.
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount <= 0` (nothing written)
    /// - `NotFound` / `NegativeBalance` from the funds check (nothing written)
    ///   or from the reservation (order left `Pending`/`Unreserved`)
    /// - `Store` on store failure
    pub async fn create_sell_order(
        &self,
        user_id: &str,
        order_id: &str,
        amount: Decimal,
    ) -> LedgerResult<Order> {
        let amount = Amount::new(amount)?;
        let debit = -amount.as_decimal();

        if self.funds_check == FundsCheck::BeforeWrite {
            self.ledger.fetch_balance(user_id).await?.apply(debit, debit)?;
        }

        let mut order = Order::new_sell(order_id, user_id, amount);
        self.store.save(&order).await?;
        debug!(%order_id, %user_id, %amount, "Order written, reserving funds");

        if let Err(e) = self.ledger.adjust(user_id, debit, debit).await {
            warn!(
                %order_id,
                %user_id,
                error = %e,
                "Order left pending without a funds reservation"
            );
            return Err(e);
        }

        order.mark_reserved()?;
        if let Err(e) = self.write_fields(&order, &FUNDS_FIELDS).await {
            warn!(
                %order_id,
                %user_id,
                error = %e,
                "Funds reserved but order still marked unreserved"
            );
            return Err(e);
        }

        info!(%order_id, %user_id, %amount, "Sell order created");
        Ok(order)
    }

    /// Settle an order, using the owner recorded on the order.
    ///
    /// # Errors
    /// - `NotFound` if the order does not exist
    /// - `AlreadySettled` if it is already settled (nothing written)
    /// - `ReservationMissing` if its creation debit never landed (nothing written)
    /// - balance errors from the settlement debit under `DebitTotal`
    ///   (order left `Settled`/`Reserved`)
    pub async fn settle(&self, order_id: &str) -> LedgerResult<Order> {
        self.settle_order(order_id, None).await
    }

    /// Settle an order on behalf of `user_id`.
    ///
    /// Fails with `OwnerMismatch`, without writing, if `user_id` does not own
    /// the order.
    pub async fn settle_as(&self, order_id: &str, user_id: &str) -> LedgerResult<Order> {
        self.settle_order(order_id, Some(user_id)).await
    }

    async fn settle_order(&self, order_id: &str, caller: Option<&str>) -> LedgerResult<Order> {
        let mut order = self.fetch_order(order_id).await?;

        if let Some(caller) = caller {
            if caller != order.user_id {
                return Err(LedgerError::OwnerMismatch {
                    order_id: order_id.to_string(),
                    owner: order.user_id.clone(),
                    caller: caller.to_string(),
                });
            }
        }

        order.settle()?;
        if order.funds == FundsState::Unreserved {
            return Err(LedgerError::ReservationMissing {
                order_id: order_id.to_string(),
            });
        }

        // Unconditional: two racing settles can both get here. Only the
        // status is written, so an order stored under the same id since the
        // read keeps its own amount and funds state.
        self.write_fields(&order, &STATUS_FIELDS).await?;

        if self.settlement == SettlementPolicy::DebitTotal {
            let debit = -order.amount.as_decimal();
            if let Err(e) = self.ledger.adjust(&order.user_id, Decimal::ZERO, debit).await {
                warn!(
                    %order_id,
                    user_id = %order.user_id,
                    error = %e,
                    "Order settled but total not debited"
                );
                return Err(e);
            }

            order.mark_finalized()?;
            self.write_fields(&order, &FUNDS_FIELDS).await?;
        }

        info!(
            %order_id,
            user_id = %order.user_id,
            amount = %order.amount,
            policy = %self.settlement,
            "Order settled"
        );
        Ok(order)
    }

    /// Re-drive whatever balance postings an order is missing.
    ///
    /// - `Unreserved` order: apply the creation debit, mark `Reserved`.
    /// - `Settled` + `Reserved` order under `DebitTotal`: apply the settlement
    ///   debit, mark `Finalized`.
    ///
    /// A posting that landed but whose marker write failed is not detectable
    /// here and would be applied twice. The same holds for an order whose
    /// create or settle is still in flight: until its marker is written it
    /// looks exactly like a stuck one, so reconcile only orders whose
    /// workflow call has returned.
    pub async fn reconcile(&self, order_id: &str) -> LedgerResult<ReconcileReport> {
        let mut order = self.fetch_order(order_id).await?;
        let debit = -order.amount.as_decimal();
        let mut applied = Vec::new();

        if order.funds == FundsState::Unreserved {
            self.ledger.adjust(&order.user_id, debit, debit).await?;
            order.mark_reserved()?;
            self.write_fields(&order, &FUNDS_FIELDS).await?;
            applied.push(Posting::Reservation);
        }

        if order.is_settled()
            && order.funds == FundsState::Reserved
            && self.settlement == SettlementPolicy::DebitTotal
        {
            self.ledger.adjust(&order.user_id, Decimal::ZERO, debit).await?;
            order.mark_finalized()?;
            self.write_fields(&order, &FUNDS_FIELDS).await?;
            applied.push(Posting::SettlementDebit);
        }

        if applied.is_empty() {
            debug!(%order_id, "Order already reconciled");
        } else {
            info!(%order_id, user_id = %order.user_id, ?applied, "Order reconciled");
        }

        Ok(ReconcileReport { order, applied })
    }

    /// Merge the named attributes of `order` into the stored record, leaving
    /// every other attribute as stored.
    async fn write_fields(&self, order: &Order, fields: &[&str]) -> LedgerResult<()> {
        let item = to_item(order)?;
        let set: Item = fields
            .iter()
            .filter_map(|name| item.get(*name).map(|value| (name.to_string(), value.clone())))
            .collect();

        match self
            .store
            .conditional_update(Table::Orders, &order.order_id, set, Item::new())
            .await?
        {
            UpdateOutcome::Applied => Ok(()),
            UpdateOutcome::ConditionFailed => Err(LedgerError::not_found("order", &order.order_id)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
