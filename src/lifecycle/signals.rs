//! OS signal handling.
//!
//! # Responsibilities
//! - Register termination handlers (SIGINT, SIGTERM; Ctrl-C off Unix)
//! - Translate every delivery into a [`TerminationRequest`] on a channel
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are registered before `listen` returns, so nothing delivered
//!   after that point is missed
//! - Requests are forwarded, never acted on here; the Signal Arbiter decides
//!   what a first or second request means

use std::fmt;

use tokio::sync::mpsc;

/// Which class of termination request arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for TerminationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationKind::Interrupt => f.write_str("SIGINT"),
            TerminationKind::Terminate => f.write_str("SIGTERM"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationRequest {
    pub kind: TerminationKind,
}

impl TerminationRequest {
    pub fn new(kind: TerminationKind) -> Self {
        Self { kind }
    }
}

pub type TerminationSender = mpsc::UnboundedSender<TerminationRequest>;
pub type TerminationReceiver = mpsc::UnboundedReceiver<TerminationRequest>;

/// Channel pair carrying termination requests to the arbiter.
pub fn channel() -> (TerminationSender, TerminationReceiver) {
    mpsc::unbounded_channel()
}

/// Install OS handlers and forward every delivery to the returned receiver.
///
/// Must be called from within a Tokio runtime.
#[cfg(unix)]
pub fn listen() -> std::io::Result<TerminationReceiver> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let (tx, rx) = channel();

    tokio::spawn(async move {
        loop {
            let kind = tokio::select! {
                Some(()) = interrupt.recv() => TerminationKind::Interrupt,
                Some(()) = terminate.recv() => TerminationKind::Terminate,
                else => break,
            };
            tracing::debug!(signal = %kind, "Termination signal delivered");
            if tx.send(TerminationRequest::new(kind)).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(not(unix))]
pub fn listen() -> std::io::Result<TerminationReceiver> {
    let (tx, rx) = channel();

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Ctrl-C delivered");
            if tx.send(TerminationRequest::new(TerminationKind::Interrupt)).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
