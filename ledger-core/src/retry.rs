//! Retry policies for the balance compare-and-swap loop.
//!
//! A policy is consulted every time a conditional write loses to another
//! writer. It either returns how long to wait before re-reading, or `None`
//! to stop retrying.

use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Decides what happens after a lost compare-and-swap.
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `conflicts` counts the attempts lost so far on this call (starts at 1).
    fn next_delay(&self, conflicts: u32) -> Option<Duration>;
}

/// Retry immediately, forever.
///
/// The caller stays blocked until the write lands or a non-conflict error
/// occurs. Each round re-reads fresh state, so this can livelock under
/// sustained contention but never deadlocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl RetryPolicy for Unbounded {
    fn next_delay(&self, _conflicts: u32) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// Bounded exponential backoff with optional full jitter.
///
/// Delay after the n-th conflict is `base * 2^(n-1)`, capped at `max`.
/// With jitter, the actual delay is drawn uniformly from `[0, delay]`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay after the first conflict
    pub base: Duration,
    /// Upper bound on any single delay
    pub max: Duration,
    /// Total attempts allowed before giving up (`None` = never give up)
    pub max_attempts: Option<u32>,
    /// Randomize each delay in `[0, delay]`
    pub jitter: bool,
}

impl ExponentialBackoff {
    /// Create an unbounded-attempts backoff without jitter.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            max_attempts: None,
            jitter: false,
        }
    }

    /// Give up once `attempts` attempts have lost the race.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Enable full jitter.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Delay ceiling after `conflicts` lost attempts, before jitter.
    pub fn ceiling(&self, conflicts: u32) -> Duration {
        let exponent = conflicts.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, conflicts: u32) -> Option<Duration> {
        if let Some(max_attempts) = self.max_attempts {
            if conflicts >= max_attempts {
                return None;
            }
        }

        let ceiling = self.ceiling(conflicts);
        if !self.jitter || ceiling.is_zero() {
            return Some(ceiling);
        }

        let nanos = u64::try_from(ceiling.as_nanos()).unwrap_or(u64::MAX);
        Some(Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos)))
    }
}

// =============================================================================
// Tests
// =============================================================================
