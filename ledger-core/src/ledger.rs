//! Ledger: balance reads and compare-and-swap adjustments.
//!
//! # Adjust loop
//!
//! ```text
//! read balance ─► compute new values ─► negative? ──yes──► NegativeBalance
//!      ▲                                    │ no
//!      │                                    ▼
//!      └──── retry policy ◄── conflict ◄── conditional write ──applied──► done
//! ```
//!
//! The conditional write compares both `available` and `total` against the
//! raw attributes that were read, so a concurrent change to either field
//! fails the write instead of being overwritten.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use ledger_domain::Balance;
use ledger_store::{
    balance_amounts, from_item, to_item, InsertOutcome, Item, KeyValueStore, RecordStore, Table,
    UpdateOutcome,
};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::retry::{RetryPolicy, Unbounded};

/// Balance attributes compared by the conditional write.
const CAS_ATTRIBUTES: [&str; 2] = ["available", "total"];

/// Owns balance state and its safe-update protocol.
pub struct Ledger<S: KeyValueStore + ?Sized> {
    /// Store holding the Balances table
    store: Arc<S>,
    /// What to do after losing a compare-and-swap
    retry: Arc<dyn RetryPolicy>,
    /// Deadline for one adjustment, retries included
    timeout: Option<Duration>,
}

impl<S: KeyValueStore + ?Sized> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            retry: Arc::clone(&self.retry),
            timeout: self.timeout,
        }
    }
}

impl<S: KeyValueStore + ?Sized> Ledger<S> {
    /// Create a ledger that retries conflicts immediately and forever.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry: Arc::new(Unbounded),
            timeout: None,
        }
    }

    /// Create a ledger from configuration.
    pub fn from_config(store: Arc<S>, config: &LedgerConfig) -> Self {
        Self {
            store,
            retry: config.retry.policy(),
            timeout: config.operation_timeout,
        }
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry = policy;
        self
    }

    /// Abort an adjustment that has not landed within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read a balance by user.
    ///
    /// # Errors
    /// - `NotFound` if no balance exists for `user_id`
    /// - `Store` if the read fails or the record does not decode
    pub async fn fetch_balance(&self, user_id: &str) -> LedgerResult<Balance> {
        let balance: Option<Balance> = self.store.load(user_id).await?;
        balance.ok_or_else(|| LedgerError::not_found("balance", user_id))
    }

    /// Provision a balance. The first write wins.
    ///
    /// # Errors
    /// - `NegativeBalance` if either opening value is negative
    /// - `AccountExists` if a balance is already stored for `user_id`
    pub async fn open_account(
        &self,
        user_id: &str,
        available: Decimal,
        total: Decimal,
    ) -> LedgerResult<Balance> {
        let balance = Balance::new(user_id, Decimal::ZERO, Decimal::ZERO).apply(available, total)?;

        match self.store.insert(Table::Balances, user_id, to_item(&balance)?).await? {
            InsertOutcome::Inserted => {
                info!(%user_id, %available, %total, "Account opened");
                Ok(balance)
            },
            InsertOutcome::AlreadyExists => Err(LedgerError::AccountExists(user_id.to_string())),
        }
    }

    /// Apply independent deltas to `available` and `total`.
    ///
    /// Returns the balance as written. Conflicting concurrent writers are
    /// absorbed by re-reading and retrying per the retry policy.
    ///
    /// # Errors
    /// - `NotFound` if no balance exists for `user_id`
    /// - `NegativeBalance` if either field would go below zero (nothing written)
    /// - `Overflow` if either field would leave the decimal range (nothing written)
    /// - `Timeout` if the configured deadline passes first
    /// - `RetriesExhausted` if a bounded retry policy gives up
    /// - `Store` on any other store failure
    pub async fn adjust(
        &self,
        user_id: &str,
        available_delta: Decimal,
        total_delta: Decimal,
    ) -> LedgerResult<Balance> {
        let attempt = self.adjust_until_applied(user_id, available_delta, total_delta);

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, attempt).await.map_err(|_| {
                warn!(%user_id, ?limit, "Balance adjustment timed out");
                LedgerError::Timeout {
                    user_id: user_id.to_string(),
                    elapsed: limit,
                }
            })?,
            None => attempt.await,
        }
    }

    /// Apply the same delta to both `available` and `total`.
    pub async fn adjust_both(&self, user_id: &str, amount: Decimal) -> LedgerResult<Balance> {
        self.adjust(user_id, amount, amount).await
    }

    async fn adjust_until_applied(
        &self,
        user_id: &str,
        available_delta: Decimal,
        total_delta: Decimal,
    ) -> LedgerResult<Balance> {
        let mut conflicts: u32 = 0;

        loop {
            let (current, expected) = self.read_for_update(user_id).await?;
            let next = current.apply(available_delta, total_delta)?;
            let set = balance_amounts(next.available, next.total)?;

            match self.store.conditional_update(Table::Balances, user_id, set, expected).await? {
                UpdateOutcome::Applied => {
                    debug!(
                        %user_id,
                        available = %next.available,
                        total = %next.total,
                        conflicts,
                        "Balance adjusted"
                    );
                    return Ok(next);
                },
                UpdateOutcome::ConditionFailed => {
                    conflicts = conflicts.saturating_add(1);
                    debug!(%user_id, conflicts, "Balance changed since read, retrying");

                    match self.retry.next_delay(conflicts) {
                        Some(delay) if delay.is_zero() => tokio::task::yield_now().await,
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            warn!(%user_id, conflicts, "Retry policy gave up on contended balance");
                            return Err(LedgerError::RetriesExhausted {
                                user_id: user_id.to_string(),
                                attempts: conflicts,
                            });
                        },
                    }
                },
            }
        }
    }

    /// Read a balance together with the exact stored attributes the
    /// conditional write must match.
    async fn read_for_update(&self, user_id: &str) -> LedgerResult<(Balance, Item)> {
        let item = self
            .store
            .get(Table::Balances, user_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("balance", user_id))?;

        let expected: Item = CAS_ATTRIBUTES
            .iter()
            .filter_map(|name| item.get(*name).map(|value| (name.to_string(), value.clone())))
            .collect();
        let balance: Balance = from_item(item)?;

        Ok((balance, expected))
    }
}

// =============================================================================
// Tests
// =============================================================================
