//! Budget sanity checks.
//!
//! # Responsibilities
//! - Spot budgets that cannot fit inside the overall deadline
//! - Spot a zero overall deadline
//!
//! # Design Decisions
//! - Returns all warnings, not just the first
//! - Pure function: ShutdownConfig → Vec<BudgetWarning>
//! - Nothing is rejected or adjusted; exceeding the deadline is a legal
//!   configuration that ends in a timeout-forced exit

use std::fmt;
use std::time::Duration;

use crate::config::schema::ShutdownConfig;

/// A budget combination that will likely end in a forced exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetWarning {
    /// The overall deadline is zero; every shutdown will be timeout-forced.
    ZeroDeadline,
    /// Drain plus callback budgets leave no room inside the overall deadline.
    BudgetsExceedDeadline {
        planned: Duration,
        deadline: Duration,
    },
}

impl fmt::Display for BudgetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetWarning::ZeroDeadline => write!(f, "shutdown deadline is zero"),
            BudgetWarning::BudgetsExceedDeadline { planned, deadline } => write!(
                f,
                "drain + callback budgets ({:?}) reach the shutdown deadline ({:?})",
                planned, deadline
            ),
        }
    }
}

/// Report budget combinations that will likely trip the overall deadline.
pub fn check_budgets(config: &ShutdownConfig) -> Vec<BudgetWarning> {
    let mut warnings = Vec::new();

    if config.shutdown_deadline.is_zero() {
        warnings.push(BudgetWarning::ZeroDeadline);
    }

    let planned = config.planned_total();
    if planned >= config.shutdown_deadline {
        warnings.push(BudgetWarning::BudgetsExceedDeadline {
            planned,
            deadline: config.shutdown_deadline,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_clean() {
        assert!(check_budgets(&ShutdownConfig::default()).is_empty());
    }

    #[test]
    fn oversized_budgets_are_reported() {
        let config = ShutdownConfig {
            shutdown_deadline: Duration::from_secs(5),
            drain_budget: Duration::from_secs(4),
            callback_budget: Duration::from_secs(3),
        };
        assert_eq!(
            check_budgets(&config),
            vec![BudgetWarning::BudgetsExceedDeadline {
                planned: Duration::from_secs(7),
                deadline: Duration::from_secs(5),
            }]
        );
    }

    #[test]
    fn zero_deadline_reports_everything() {
        let config = ShutdownConfig {
            shutdown_deadline: Duration::ZERO,
            ..ShutdownConfig::default()
        };
        let warnings = check_budgets(&config);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0], BudgetWarning::ZeroDeadline);
    }
}
