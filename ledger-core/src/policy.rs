//! Named accounting policies for the order workflow.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What settlement does to the owner's balance.
///
/// Order creation already debits both `available` and `total` by the order
/// amount. The two policies disagree on whether settlement debits again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettlementPolicy {
    /// Settlement only flips the order status; the creation debit is final.
    #[default]
    StatusOnly,
    /// Settlement also debits `total` by the order amount, leaving
    /// `available` untouched.
    DebitTotal,
}

impl fmt::Display for SettlementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementPolicy::StatusOnly => write!(f, "status-only"),
            SettlementPolicy::DebitTotal => write!(f, "debit-total"),
        }
    }
}

impl FromStr for SettlementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "status-only" | "status_only" => Ok(SettlementPolicy::StatusOnly),
            "debit-total" | "debit_total" => Ok(SettlementPolicy::DebitTotal),
            other => Err(format!(
                "unknown settlement policy: {}. Expected: status-only, debit-total",
                other
            )),
        }
    }
}

/// Whether order creation checks funds before writing the order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FundsCheck {
    /// Read the balance first and reject without writing anything if the
    /// reservation would go negative.
    #[default]
    BeforeWrite,
    /// Write the order first and let the balance adjustment reject; a
    /// rejection leaves an unreserved pending order behind.
    Skip,
}

impl fmt::Display for FundsCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundsCheck::BeforeWrite => write!(f, "before-write"),
            FundsCheck::Skip => write!(f, "skip"),
        }
    }
}

impl FromStr for FundsCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "before-write" | "before_write" => Ok(FundsCheck::BeforeWrite),
            "skip" | "none" => Ok(FundsCheck::Skip),
            other => Err(format!("unknown funds check: {}. Expected: before-write, skip", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_policy_parse_and_display() {
        assert_eq!("debit-total".parse::<SettlementPolicy>(), Ok(SettlementPolicy::DebitTotal));
        assert_eq!("Status_Only".parse::<SettlementPolicy>(), Ok(SettlementPolicy::StatusOnly));
        assert!("refund".parse::<SettlementPolicy>().is_err());

        assert_eq!(SettlementPolicy::DebitTotal.to_string(), "debit-total");
        assert_eq!(SettlementPolicy::default(), SettlementPolicy::StatusOnly);
    }

    #[test]
    fn test_funds_check_parse_and_display() {
        assert_eq!("skip".parse::<FundsCheck>(), Ok(FundsCheck::Skip));
        assert_eq!(" before-write ".parse::<FundsCheck>(), Ok(FundsCheck::BeforeWrite));
        assert!("later".parse::<FundsCheck>().is_err());

        assert_eq!(FundsCheck::BeforeWrite.to_string(), "before-write");
        assert_eq!(FundsCheck::default(), FundsCheck::BeforeWrite);
    }
}
