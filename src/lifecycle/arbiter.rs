//! Signal Arbiter: the single owner of process exit.
//!
//! ```text
//! first request ──▶ spawn sequencer(ctx = now + shutdown_deadline)
//!                     │
//!        ┌────────────┼──────────────────┐
//!   second request  sequencer Done   ctx deadline
//!        │            │                  │
//!   ForcedByOperator  Clean        ForcedByTimeout
//! ```

use std::convert::Infallible;
use std::fmt;
use std::time::Duration;

use tokio::sync::watch;

use crate::lifecycle::context::ShutdownContext;
use crate::lifecycle::shutdown::{Phase, ShutdownSequencer};
use crate::lifecycle::signals::{TerminationReceiver, TerminationRequest};
use crate::observability::metrics;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitOutcome {
    /// Every phase finished inside the deadline.
    Clean,
    /// A second termination request arrived during the sequence.
    ForcedByOperator,
    /// The overall shutdown deadline passed first.
    ForcedByTimeout,
}

impl ExitOutcome {
    /// Process exit code for this outcome.
    pub const fn code(self) -> i32 {
        match self {
            ExitOutcome::Clean => 0,
            ExitOutcome::ForcedByTimeout => 1,
            ExitOutcome::ForcedByOperator => 127,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitOutcome::Clean => "clean",
            ExitOutcome::ForcedByOperator => "forced_by_operator",
            ExitOutcome::ForcedByTimeout => "forced_by_timeout",
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Waits for termination requests and decides how the process ends.
pub struct SignalArbiter {
    requests: TerminationReceiver,
    sequencer: ShutdownSequencer,
    shutdown_deadline: Duration,
}

impl SignalArbiter {
    pub fn new(
        requests: TerminationReceiver,
        sequencer: ShutdownSequencer,
        shutdown_deadline: Duration,
    ) -> Self {
        Self {
            requests,
            sequencer,
            shutdown_deadline,
        }
    }

    /// Block until the process should exit and report why.
    ///
    /// The sequencer task is aborted on either forced path.
    pub async fn run(self) -> ExitOutcome {
        let SignalArbiter {
            mut requests,
            sequencer,
            shutdown_deadline,
        } = self;

        let first = next_request(&mut requests).await;
        tracing::info!(
            signal = %first.kind,
            deadline_ms = shutdown_deadline.as_millis() as u64,
            "Termination requested; send it again to force exit"
        );

        let ctx = ShutdownContext::with_timeout(shutdown_deadline);
        let mut phases = sequencer.subscribe();
        let sequence = tokio::spawn(sequencer.execute(ctx.clone()));

        let outcome = tokio::select! {
            biased;
            second = next_request(&mut requests) => {
                tracing::warn!(signal = %second.kind, "Second termination request, exiting now");
                ExitOutcome::ForcedByOperator
            }
            _ = completion(&mut phases) => ExitOutcome::Clean,
            _ = ctx.done() => {
                let reason = ctx.err().map(|e| e.to_string()).unwrap_or_default();
                let phase = *phases.borrow();
                tracing::warn!(phase = %phase, reason = %reason, "Shutdown deadline reached, exiting now");
                ExitOutcome::ForcedByTimeout
            }
        };

        if outcome != ExitOutcome::Clean {
            sequence.abort();
        }
        metrics::record_exit(outcome);
        outcome
    }

    /// Run, then terminate the process with the outcome's exit code.
    pub async fn run_and_exit(self) -> Infallible {
        let outcome = self.run().await;
        tracing::info!(outcome = %outcome, code = outcome.code(), "Process exiting");
        std::process::exit(outcome.code())
    }
}

/// Next request; pends forever once no more requests can arrive.
async fn next_request(requests: &mut TerminationReceiver) -> TerminationRequest {
    match requests.recv().await {
        Some(request) => request,
        None => std::future::pending().await,
    }
}

/// Resolve when the sequencer publishes `Done`; pend if it never will.
async fn completion(phases: &mut watch::Receiver<Phase>) {
    if phases.wait_for(|phase| *phase == Phase::Done).await.is_err() {
        std::future::pending::<()>().await;
    }
}
