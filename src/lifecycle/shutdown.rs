//! Phased teardown for one shutdown attempt.
//!
//! ```text
//! Rejecting ──▶ Draining ──▶ RunningCallbacks ──▶ Cleaning ──▶ Done
//!  (all servers)  (fixed timer,     (barrier, shared      (hooks in
//!                  then close)       sub-deadline)         order)
//! ```
//!
//! Phases are strictly sequential; work inside a phase is concurrent. The
//! sequencer reports through its phase channel only: reaching `Done` is the
//! completion signal. When the deadline context ends first the sequencer
//! stops at its next suspension point and never publishes `Done`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::ShutdownConfig;
use crate::lifecycle::callbacks::CallbackRegistry;
use crate::lifecycle::cleanup::{self, CleanupHook};
use crate::lifecycle::context::ShutdownContext;
use crate::observability::metrics;
use crate::server::ManagedServer;

/// Where the process is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Serving normally; no termination request yet.
    Running,
    Rejecting,
    Draining,
    RunningCallbacks,
    Cleaning,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Running => "running",
            Phase::Rejecting => "rejecting",
            Phase::Draining => "draining",
            Phase::RunningCallbacks => "running_callbacks",
            Phase::Cleaning => "cleaning",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives reject → drain → callbacks → cleanup under a deadline.
pub struct ShutdownSequencer {
    servers: Arc<[Arc<dyn ManagedServer>]>,
    callbacks: CallbackRegistry,
    cleanup: Vec<CleanupHook>,
    config: ShutdownConfig,
    phase: watch::Sender<Phase>,
}

impl ShutdownSequencer {
    pub fn new(
        servers: Arc<[Arc<dyn ManagedServer>]>,
        callbacks: CallbackRegistry,
        cleanup: Vec<CleanupHook>,
        config: ShutdownConfig,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Running);
        Self {
            servers,
            callbacks,
            cleanup,
            config,
            phase,
        }
    }

    /// Observe phase transitions. `Done` means the sequence completed.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Run the full teardown. Consumes the sequencer: one attempt only.
    pub async fn execute(self, ctx: ShutdownContext) {
        let ShutdownSequencer {
            servers,
            callbacks,
            cleanup,
            config,
            phase,
        } = self;
        let mut clock = PhaseClock::new(phase);

        tracing::info!(
            servers = servers.len(),
            callbacks = callbacks.len(),
            remaining_ms = ctx.remaining().as_millis() as u64,
            "Graceful shutdown started"
        );

        clock.enter(Phase::Rejecting);
        for server in servers.iter() {
            server.reject_new_traffic();
            tracing::info!(server = %server.name(), "Server rejecting new requests");
        }

        clock.enter(Phase::Draining);
        let drain = config.drain_budget;
        for server in servers.iter() {
            let server = Arc::clone(server);
            tracing::info!(
                server = %server.name(),
                drain_ms = drain.as_millis() as u64,
                "Waiting for in-flight requests"
            );
            tokio::spawn(async move {
                tokio::time::sleep(drain).await;
                server.force_close();
            });
        }
        if !until_deadline(&ctx, clock.current(), tokio::time::sleep(drain)).await {
            return;
        }

        clock.enter(Phase::RunningCallbacks);
        let callback_ctx = ctx.child_with_timeout(config.callback_budget);
        let report = callbacks.run_all(&callback_ctx).await;
        tracing::info!(
            completed = report.completed,
            cut_off = report.cut_off,
            panicked = report.panicked,
            "All shutdown callbacks returned"
        );
        if let Some(err) = ctx.err() {
            tracing::warn!(phase = %clock.current(), reason = %err, "Shutdown interrupted");
            return;
        }

        clock.enter(Phase::Cleaning);
        let released = cleanup::release_all(cleanup);
        tracing::info!(released, "Resources released");

        clock.enter(Phase::Done);
        tracing::info!("Graceful shutdown complete");
    }
}

/// Await `work` unless the context ends first. `false` means it ended.
async fn until_deadline<F: Future<Output = ()>>(
    ctx: &ShutdownContext,
    phase: Phase,
    work: F,
) -> bool {
    tokio::select! {
        _ = work => true,
        _ = ctx.done() => {
            let reason = ctx.err().map(|e| e.to_string()).unwrap_or_default();
            tracing::warn!(phase = %phase, reason = %reason, "Shutdown interrupted");
            false
        }
    }
}

/// Publishes phase changes and records how long each phase took.
struct PhaseClock {
    tx: watch::Sender<Phase>,
    current: Phase,
    entered: Instant,
}

impl PhaseClock {
    fn new(tx: watch::Sender<Phase>) -> Self {
        let current = *tx.borrow();
        Self {
            tx,
            current,
            entered: Instant::now(),
        }
    }

    fn current(&self) -> Phase {
        self.current
    }

    fn enter(&mut self, next: Phase) {
        let now = Instant::now();
        if self.current != Phase::Running {
            metrics::record_phase(self.current, now.duration_since(self.entered));
        }
        tracing::info!(from = %self.current, to = %next, "Shutdown phase transition");
        self.current = next;
        self.entered = now;
        self.tx.send_replace(next);
    }
}
