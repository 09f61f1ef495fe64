//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build App → start every server concurrently → hand off to arbiter
//!
//! Signals (signals.rs, arbiter.rs):
//!     SIGINT/SIGTERM → first: start shutdown under a deadline
//!                    → second: exit now (operator override)
//!
//! Shutdown (shutdown.rs):
//!     Reject new traffic → drain (fixed timer) → force close
//!     → callbacks behind a barrier (callbacks.rs, context.rs)
//!     → release resources (cleanup.rs) → Done
//! ```
//!
//! # Design Decisions
//! - Phases are sequential; work within a phase is concurrent
//! - Shutdown has a deadline: forced exit once it passes
//! - Only the arbiter calls `process::exit`

pub mod arbiter;
pub mod callbacks;
pub mod cleanup;
pub mod context;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use arbiter::{ExitOutcome, SignalArbiter};
pub use callbacks::{CallbackRegistry, CallbackReport, ShutdownCallback};
pub use cleanup::CleanupHook;
pub use context::{ContextError, ShutdownContext};
pub use shutdown::{Phase, ShutdownSequencer};
pub use signals::{TerminationKind, TerminationReceiver, TerminationRequest, TerminationSender};
pub use startup::{App, AppBuilder};
