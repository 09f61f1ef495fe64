//! Managed server contract.
//!
//! # Lifecycle
//! ```text
//! created → start() (serving) → reject_new_traffic() (503 for new work)
//!         → force_close() (connections dropped, start() returns)
//! ```
//!
//! # Design Decisions
//! - Object safe: the orchestrator holds `Arc<dyn ManagedServer>`
//! - Rejection is one atomic flag checked at the front of every request
//! - Closing never fails from the caller's point of view; problems are logged
//!   so one server cannot abort the teardown of the others
//! - No "drained" notification: the drain phase is a fixed timer

use futures_util::future::BoxFuture;
use thiserror::Error;

/// Failures that end a server's `start` for a reason other than a close.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server {name} failed to bind {address}: {source}")]
    Bind {
        name: String,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server {name} could not resolve its local address: {source}")]
    LocalAddr {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server {name} was already started")]
    AlreadyStarted { name: String },
}

/// A unit of network service under the orchestrator's lifecycle control.
pub trait ManagedServer: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Address for logging; the bound address once known.
    fn address(&self) -> String;

    /// Serve until force-closed.
    ///
    /// Resolves to `Ok(())` after an intentional close.
    fn start(&self) -> BoxFuture<'_, Result<(), ServerError>>;

    /// Answer every subsequent request with "service unavailable".
    ///
    /// Idempotent and synchronous.
    fn reject_new_traffic(&self);

    /// Terminate now, regardless of in-flight work.
    ///
    /// Idempotent; logs the outcome and never propagates an error.
    fn force_close(&self);
}
