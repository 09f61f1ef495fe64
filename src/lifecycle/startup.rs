//! Startup orchestration.
//!
//! # Responsibilities
//! - Collect servers, callbacks, cleanup hooks and budgets (builder options)
//! - Start every server concurrently
//! - Hand control to the Signal Arbiter
//!
//! # Design Decisions
//! - Everything is registered before the App is built; nothing changes after
//! - A server that fails to start is logged and left out; the others keep
//!   serving
//! - The App never exits the process itself: only the arbiter does

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{check_budgets, ShutdownConfig};
use crate::lifecycle::arbiter::{ExitOutcome, SignalArbiter};
use crate::lifecycle::callbacks::{CallbackRegistry, ShutdownCallback};
use crate::lifecycle::cleanup::CleanupHook;
use crate::lifecycle::context::ShutdownContext;
use crate::lifecycle::shutdown::ShutdownSequencer;
use crate::lifecycle::signals::{self, TerminationReceiver};
use crate::server::ManagedServer;

/// Owns the managed servers and everything run during shutdown.
pub struct App {
    servers: Arc<[Arc<dyn ManagedServer>]>,
    callbacks: CallbackRegistry,
    cleanup: Vec<CleanupHook>,
    config: ShutdownConfig,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    pub fn config(&self) -> &ShutdownConfig {
        &self.config
    }

    pub fn servers(&self) -> &[Arc<dyn ManagedServer>] {
        &self.servers
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Start every server, listen for OS termination signals and exit the
    /// process once shutdown resolves.
    ///
    /// Only returns if the signal handlers cannot be installed.
    pub async fn start_and_serve(self) -> std::io::Result<Infallible> {
        let requests = signals::listen()?;
        self.start_servers();
        Ok(self.into_arbiter(requests).run_and_exit().await)
    }

    /// Same flow as [`App::start_and_serve`] with an injected request channel
    /// and no process exit.
    pub async fn serve_until(self, requests: TerminationReceiver) -> ExitOutcome {
        self.start_servers();
        self.into_arbiter(requests).run().await
    }

    fn start_servers(&self) {
        for server in self.servers.iter() {
            let server = Arc::clone(server);
            tokio::spawn(async move {
                match server.start().await {
                    Ok(()) => tracing::info!(server = %server.name(), "Server closed"),
                    Err(e) => tracing::error!(
                        server = %server.name(),
                        address = %server.address(),
                        error = %e,
                        "Server exited abnormally"
                    ),
                }
            });
        }
        tracing::info!(servers = self.servers.len(), "Servers starting");
    }

    fn into_arbiter(self, requests: TerminationReceiver) -> SignalArbiter {
        let App {
            servers,
            callbacks,
            cleanup,
            config,
        } = self;
        let sequencer = ShutdownSequencer::new(servers, callbacks, cleanup, config);
        SignalArbiter::new(requests, sequencer, config.shutdown_deadline)
    }
}

/// Options for building an [`App`].
#[derive(Default)]
pub struct AppBuilder {
    servers: Vec<Arc<dyn ManagedServer>>,
    callbacks: Vec<ShutdownCallback>,
    cleanup: Vec<CleanupHook>,
    config: ShutdownConfig,
}

impl AppBuilder {
    pub fn server<S: ManagedServer>(mut self, server: S) -> Self {
        self.servers.push(Arc::new(server));
        self
    }

    /// Register a server the caller keeps a handle to.
    pub fn shared_server(mut self, server: Arc<dyn ManagedServer>) -> Self {
        self.servers.push(server);
        self
    }

    pub fn servers<I>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ManagedServer>>,
    {
        self.servers.extend(servers);
        self
    }

    pub fn callback<F, Fut>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(ShutdownContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callbacks.push(ShutdownCallback::new(name, callback));
        self
    }

    pub fn anonymous_callback<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(ShutdownContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = format!("callback-{}", self.callbacks.len());
        self.callback(name, callback)
    }

    /// Release step run after every callback has returned.
    pub fn cleanup<F>(mut self, name: impl Into<String>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanup.push(CleanupHook::new(name, release));
        self
    }

    pub fn config(mut self, config: ShutdownConfig) -> Self {
        self.config = config;
        self
    }

    pub fn shutdown_deadline(mut self, deadline: Duration) -> Self {
        self.config.shutdown_deadline = deadline;
        self
    }

    pub fn drain_budget(mut self, budget: Duration) -> Self {
        self.config.drain_budget = budget;
        self
    }

    pub fn callback_budget(mut self, budget: Duration) -> Self {
        self.config.callback_budget = budget;
        self
    }

    pub fn build(self) -> App {
        let config = self.config;
        tracing::info!(
            shutdown_deadline_ms = config.shutdown_deadline.as_millis() as u64,
            drain_budget_ms = config.drain_budget.as_millis() as u64,
            callback_budget_ms = config.callback_budget.as_millis() as u64,
            servers = self.servers.len(),
            callbacks = self.callbacks.len(),
            "Shutdown budgets configured"
        );
        for warning in check_budgets(&config) {
            tracing::warn!(%warning, "Shutdown budgets will likely force exit");
        }

        App {
            servers: self.servers.into(),
            callbacks: CallbackRegistry::new(self.callbacks),
            cleanup: self.cleanup,
            config,
        }
    }
}
