//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle / http subsystems produce:
//!     → logging.rs (structured log events: phases, per-server, per-callback)
//!     → metrics.rs (phase durations, callback outcomes, rejections, exits)
//! ```

pub mod logging;
pub mod metrics;
