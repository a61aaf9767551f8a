//! Wall-clock budget shared by sequential provider calls.

use std::time::Duration;
use tokio::time::Instant;

pub const MIN_BUDGET_MS: u64 = 2_000;
pub const MAX_BUDGET_MS: u64 = 60_000;
pub const DEFAULT_BUDGET_MS: u64 = 12_000;

/// Deadline derived from a requested total timeout, clamped to
/// [`MIN_BUDGET_MS`, `MAX_BUDGET_MS`].
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    deadline: Instant,
    total: Duration,
}

impl TimeBudget {
    pub fn start(requested_ms: u64) -> Self {
        let total = Duration::from_millis(clamp_budget_ms(requested_ms));
        Self {
            deadline: Instant::now() + total,
            total,
        }
    }

    /// Unclamped deadline, for bounding a single provider call that issues several requests.
    pub fn with_total(total: Duration) -> Self {
        Self {
            deadline: Instant::now() + total,
            total,
        }
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Per-call timeout: the provider default, capped by what is left.
    /// `None` once the deadline has passed.
    pub fn timeout_for(&self, provider_default: Duration) -> Option<Duration> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            None
        } else {
            Some(provider_default.min(remaining))
        }
    }
}

pub fn clamp_budget_ms(requested_ms: u64) -> u64 {
    requested_ms.clamp(MIN_BUDGET_MS, MAX_BUDGET_MS)
}
