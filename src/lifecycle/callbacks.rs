//! Shutdown callbacks and the barrier that runs them.
//!
//! # Responsibilities
//! - Hold the callbacks registered at construction time (immutable after)
//! - Launch every callback concurrently with the same deadline context
//! - Join all of them before the callback phase ends
//!
//! # Design Decisions
//! - No ordering or dependencies between callbacks
//! - Cancellation is cooperative: callbacks see the context and should return
//!   when it is done
//! - Callbacks still running a short grace period after the context ends are
//!   aborted at their next await point and joined, so nothing from this
//!   phase outlives the barrier
//! - A panicking callback is logged and counted; it never reaches the caller

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};

use crate::lifecycle::context::ShutdownContext;
use crate::observability::metrics;

/// Time callbacks get to return on their own after the context is done.
pub const CANCELLATION_GRACE: Duration = Duration::from_millis(50);

type CallbackFn = dyn Fn(ShutdownContext) -> BoxFuture<'static, ()> + Send + Sync;

/// Application-supplied cleanup logic run during teardown.
#[derive(Clone)]
pub struct ShutdownCallback {
    name: Arc<str>,
    func: Arc<CallbackFn>,
}

impl ShutdownCallback {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(ShutdownContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name: String = name.into();
        Self {
            name: name.into(),
            func: Arc::new(move |ctx| -> BoxFuture<'static, ()> { Box::pin(func(ctx)) }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, ctx: ShutdownContext) -> BoxFuture<'static, ()> {
        (self.func)(ctx)
    }
}

impl fmt::Debug for ShutdownCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCallback")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// How the callbacks of one shutdown attempt ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackReport {
    /// Returned control on their own (finished or gave up on cancellation).
    pub completed: usize,
    /// Aborted after the context ended plus the grace period.
    pub cut_off: usize,
    pub panicked: usize,
}

impl CallbackReport {
    pub fn total(&self) -> usize {
        self.completed + self.cut_off + self.panicked
    }
}

/// Ordered, immutable set of callbacks.
#[derive(Debug, Clone, Default)]
pub struct CallbackRegistry {
    callbacks: Arc<[ShutdownCallback]>,
}

impl CallbackRegistry {
    pub fn new(callbacks: Vec<ShutdownCallback>) -> Self {
        Self {
            callbacks: callbacks.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.callbacks.iter().map(ShutdownCallback::name)
    }

    /// Run every callback concurrently and wait at the barrier.
    ///
    /// Returns once every callback task has returned, been cut off, or
    /// panicked. Never waits much past `ctx`'s deadline.
    pub async fn run_all(&self, ctx: &ShutdownContext) -> CallbackReport {
        let mut report = CallbackReport::default();
        if self.callbacks.is_empty() {
            tracing::debug!("No shutdown callbacks registered");
            return report;
        }

        let mut tasks = JoinSet::new();
        let mut names: HashMap<Id, Arc<str>> = HashMap::with_capacity(self.callbacks.len());
        for callback in self.callbacks.iter() {
            tracing::debug!(callback = %callback.name, "Launching shutdown callback");
            let handle = tasks.spawn(callback.invoke(ctx.clone()));
            names.insert(handle.id(), Arc::clone(&callback.name));
        }

        let mut cutoff: Option<Instant> = None;
        loop {
            tokio::select! {
                biased;
                joined = tasks.join_next_with_id() => match joined {
                    Some(result) => record(&mut report, &mut names, result),
                    None => break,
                },
                _ = ctx.done(), if cutoff.is_none() => {
                    cutoff = Some(Instant::now() + CANCELLATION_GRACE);
                    tracing::debug!(
                        pending = tasks.len(),
                        "Callback context ended, waiting for cooperative returns"
                    );
                }
                _ = sleep_until(cutoff.unwrap_or_else(Instant::now)), if cutoff.is_some() => {
                    tracing::warn!(pending = tasks.len(), "Cutting off shutdown callbacks");
                    tasks.abort_all();
                    while let Some(result) = tasks.join_next_with_id().await {
                        record(&mut report, &mut names, result);
                    }
                    break;
                }
            }
        }

        metrics::record_callbacks(&report);
        report
    }
}

fn record(
    report: &mut CallbackReport,
    names: &mut HashMap<Id, Arc<str>>,
    result: Result<(Id, ()), JoinError>,
) {
    match result {
        Ok((id, ())) => {
            report.completed += 1;
            let name = names.remove(&id).unwrap_or_else(|| Arc::from("unknown"));
            tracing::info!(callback = %name, "Shutdown callback returned");
        }
        Err(err) => {
            let name = names.remove(&err.id()).unwrap_or_else(|| Arc::from("unknown"));
            if err.is_panic() {
                report.panicked += 1;
                tracing::error!(callback = %name, "Shutdown callback panicked");
            } else {
                report.cut_off += 1;
                tracing::warn!(callback = %name, "Shutdown callback cut off at deadline");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sleeper(name: &str, nap: Duration, hits: Arc<AtomicUsize>) -> ShutdownCallback {
        ShutdownCallback::new(name, move |ctx: ShutdownContext| {
            let hits = Arc::clone(&hits);
            async move {
                tokio::select! {
                    _ = tokio::time::sleep(nap) => { hits.fetch_add(1, Ordering::SeqCst); }
                    _ = ctx.done() => {}
                }
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn empty_registry_returns_immediately() {
        let registry = CallbackRegistry::default();
        let ctx = ShutdownContext::with_timeout(Duration::from_secs(3));

        let start = Instant::now();
        let report = registry.run_all(&ctx).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(report.total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn callbacks_run_concurrently() {
        let hits = Arc::new(AtomicUsize::new(0));
        let registry = CallbackRegistry::new(vec![
            sleeper("a", Duration::from_secs(1), hits.clone()),
            sleeper("b", Duration::from_secs(2), hits.clone()),
            sleeper("c", Duration::from_secs(2), hits.clone()),
        ]);
        let ctx = ShutdownContext::with_timeout(Duration::from_secs(3));

        let start = Instant::now();
        let report = registry.run_all(&ctx).await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(report.completed, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cooperative_callback_returns_at_deadline() {
        let hits = Arc::new(AtomicUsize::new(0));
        let registry = CallbackRegistry::new(vec![
            sleeper("flush-cache", Duration::from_secs(5), hits.clone()),
            sleeper("second", Duration::from_secs(2), hits.clone()),
        ]);
        let ctx = ShutdownContext::with_timeout(Duration::from_secs(3));

        let start = Instant::now();
        let report = registry.run_all(&ctx).await;
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(report.completed, 2);
        assert_eq!(report.cut_off, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ignoring_callback_is_cut_off() {
        let registry = CallbackRegistry::new(vec![ShutdownCallback::new(
            "stubborn",
            |_ctx| async { tokio::time::sleep(Duration::from_secs(5)).await },
        )]);
        let ctx = ShutdownContext::with_timeout(Duration::from_secs(3));

        let start = Instant::now();
        let report = registry.run_all(&ctx).await;
        assert_eq!(start.elapsed(), Duration::from_secs(3) + CANCELLATION_GRACE);
        assert_eq!(report.cut_off, 1);
        assert_eq!(report.completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn panic_is_isolated() {
        let hits = Arc::new(AtomicUsize::new(0));
        let registry = CallbackRegistry::new(vec![
            ShutdownCallback::new("boom", |_ctx| async { panic!("callback failure") }),
            sleeper("ok", Duration::from_millis(100), hits.clone()),
        ]);
        let ctx = ShutdownContext::with_timeout(Duration::from_secs(3));

        let report = registry.run_all(&ctx).await;
        assert_eq!(report.panicked, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registry_keeps_registration_order() {
        let hits = Arc::new(AtomicUsize::new(0));
        let registry = CallbackRegistry::new(vec![
            sleeper("first", Duration::ZERO, hits.clone()),
            sleeper("second", Duration::ZERO, hits),
        ]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["first", "second"]);
        assert_eq!(registry.len(), 2);
    }
}
