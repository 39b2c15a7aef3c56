//! Ledger configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{LedgerError, LedgerResult};
use crate::policy::{FundsCheck, SettlementPolicy};
use crate::retry::{ExponentialBackoff, RetryPolicy, Unbounded};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Ledger configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Compare-and-swap retry configuration
    pub retry: RetryConfig,

    /// What settlement does to the owner's balance
    pub settlement: SettlementPolicy,

    /// Whether order creation checks funds before writing the order
    pub funds_check: FundsCheck,

    /// Deadline for a single balance adjustment, retries included
    pub operation_timeout: Option<Duration>,
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay after the first conflict (zero = retry immediately, no backoff)
    pub base_delay: Duration,
    /// Upper bound on a single delay
    pub max_delay: Duration,
    /// Attempts allowed before giving up (`None` = unbounded)
    pub max_attempts: Option<u32>,
    /// Randomize delays
    pub jitter: bool,
}

impl RetryConfig {
    /// Build the retry policy this configuration describes.
    ///
    /// Zero base delay and no attempt limit is the plain unbounded spin.
    pub fn policy(&self) -> Arc<dyn RetryPolicy> {
        if self.base_delay.is_zero() && self.max_attempts.is_none() {
            return Arc::new(Unbounded);
        }

        let mut backoff = ExponentialBackoff::new(self.base_delay, self.max_delay);
        if let Some(attempts) = self.max_attempts {
            backoff = backoff.with_max_attempts(attempts);
        }
        if self.jitter {
            backoff = backoff.with_jitter();
        }
        Arc::new(backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::from_millis(100),
            max_attempts: None,
            jitter: false,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> LedgerResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> LedgerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settlement = parse_or(&lookup, "LEDGER_SETTLEMENT_POLICY", SettlementPolicy::default())?;
        let funds_check = parse_or(&lookup, "LEDGER_FUNDS_CHECK", FundsCheck::default())?;

        let defaults = RetryConfig::default();
        let retry = RetryConfig {
            base_delay: millis_or(&lookup, "LEDGER_RETRY_BASE_DELAY_MS", defaults.base_delay)?,
            max_delay: millis_or(&lookup, "LEDGER_RETRY_MAX_DELAY_MS", defaults.max_delay)?,
            max_attempts: match lookup("LEDGER_RETRY_MAX_ATTEMPTS") {
                Some(val) => match parse::<u32>("LEDGER_RETRY_MAX_ATTEMPTS", &val)? {
                    0 => None,
                    n => Some(n),
                },
                None => None,
            },
            jitter: parse_or(&lookup, "LEDGER_RETRY_JITTER", defaults.jitter)?,
        };

        let operation_timeout = match lookup("LEDGER_OPERATION_TIMEOUT_MS") {
            Some(val) => Some(Duration::from_millis(parse("LEDGER_OPERATION_TIMEOUT_MS", &val)?)),
            None => None,
        };

        Ok(Self {
            retry,
            settlement,
            funds_check,
            operation_timeout,
        })
    }

    /// Create test configuration.
    ///
    /// Bounded so a broken test fails instead of spinning forever.
    pub fn test() -> Self {
        Self {
            retry: RetryConfig {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(10),
                max_attempts: Some(1_000),
                jitter: false,
            },
            settlement: SettlementPolicy::StatusOnly,
            funds_check: FundsCheck::BeforeWrite,
            operation_timeout: Some(Duration::from_secs(5)),
        }
    }
}

fn parse<T: FromStr>(key: &str, val: &str) -> LedgerResult<T> {
    val.trim()
        .parse::<T>()
        .map_err(|_| LedgerError::Config(format!("Invalid {} value: {}", key, val)))
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> LedgerResult<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => parse(key, &val),
        None => Ok(default),
    }
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> LedgerResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(Duration::from_millis(parse(key, &val)?)),
        None => Ok(default),
    }
}

// =============================================================================
// Tests
// =============================================================================
