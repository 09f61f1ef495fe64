//! Shutdown timing configuration.
//!
//! # Data Flow
//! ```text
//! defaults / CLI flags / AppBuilder options
//!     → ShutdownConfig (immutable once the App is built)
//!     → validation.rs (budget warnings, never rejects)
//!     → shared with the Sequencer and the Signal Arbiter
//! ```
//!
//! # Design Decisions
//! - Config is fixed at construction; there is no runtime reconfiguration
//! - All fields have defaults (30s / 10s / 3s)
//! - Budget overruns are reported, not corrected: an oversized budget simply
//!   ends in a timeout-forced exit

pub mod schema;
pub mod validation;

pub use schema::ShutdownConfig;
pub use validation::{check_budgets, BudgetWarning};
