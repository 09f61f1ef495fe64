//! Configuration schema definitions.

use std::time::Duration;

/// Default overall budget for the whole shutdown sequence.
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Default time in-flight requests get before servers are force-closed.
pub const DEFAULT_DRAIN_BUDGET: Duration = Duration::from_secs(10);

/// Default time all shutdown callbacks get, combined.
pub const DEFAULT_CALLBACK_BUDGET: Duration = Duration::from_secs(3);

/// Timing budgets for one shutdown attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownConfig {
    /// Overall budget, measured from the first termination request.
    pub shutdown_deadline: Duration,

    /// Fixed wait between rejecting traffic and force-closing servers.
    pub drain_budget: Duration,

    /// Shared budget for all callbacks, derived from the overall deadline.
    pub callback_budget: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            shutdown_deadline: DEFAULT_SHUTDOWN_DEADLINE,
            drain_budget: DEFAULT_DRAIN_BUDGET,
            callback_budget: DEFAULT_CALLBACK_BUDGET,
        }
    }
}

impl ShutdownConfig {
    /// Time the sequence needs when every phase uses its full budget.
    pub fn planned_total(&self) -> Duration {
        self.drain_budget.saturating_add(self.callback_budget)
    }
}
