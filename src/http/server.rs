//! HTTP implementation of a managed server.
//!
//! # Responsibilities
//! - Wrap an Axum Router with the rejection gate, request IDs and tracing
//! - Accept connections and serve HTTP/1.1 and HTTP/2 on each
//! - Flip to 503-for-everything on `reject_new_traffic`
//! - Drop the listener and every open connection on `force_close`

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use axum::{middleware, routing::MethodRouter, Router};
use futures_util::future::BoxFuture;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::http::middleware::reject::{reject_middleware, RejectGate};
use crate::http::request::RequestIdLayer;
use crate::net::{ConnectionGuard, ConnectionTracker};
use crate::server::{ManagedServer, ServerError};

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// HTTP server under orchestrator control.
pub struct HttpServer {
    name: String,
    address: String,
    router: Router,
    listener: Mutex<Option<TcpListener>>,
    local_addr: OnceLock<SocketAddr>,
    gate: RejectGate,
    closed: CancellationToken,
    started: AtomicBool,
    connections: ConnectionTracker,
}

impl HttpServer {
    /// Server that binds `address` when started.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            gate: RejectGate::new(&name),
            name,
            address: address.into(),
            router: Router::new(),
            listener: Mutex::new(None),
            local_addr: OnceLock::new(),
            closed: CancellationToken::new(),
            started: AtomicBool::new(false),
            connections: ConnectionTracker::new(),
        }
    }

    /// Server on an already-bound listener; the port is known before start.
    pub fn from_listener(name: impl Into<String>, listener: TcpListener) -> std::io::Result<Self> {
        let local = listener.local_addr()?;
        let server = Self::new(name, local.to_string());
        let _ = server.local_addr.set(local);
        *server.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(listener);
        Ok(server)
    }

    /// Add a route. Only effective before start.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    /// Merge a prepared router. Only effective before start.
    pub fn merge(mut self, router: Router) -> Self {
        self.router = self.router.merge(router);
        self
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Connections currently open.
    pub fn in_flight(&self) -> u64 {
        self.connections.active_count()
    }

    pub fn is_rejecting(&self) -> bool {
        self.gate.is_rejecting()
    }

    /// Build the service stack. The gate sits in front of every route.
    fn build_router(&self) -> Router {
        self.router
            .clone()
            .layer(middleware::from_fn_with_state(
                self.gate.clone(),
                reject_middleware,
            ))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    async fn bind(&self) -> Result<TcpListener, ServerError> {
        let prebound = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match prebound {
            Some(listener) => Ok(listener),
            None => TcpListener::bind(&self.address)
                .await
                .map_err(|source| ServerError::Bind {
                    name: self.name.clone(),
                    address: self.address.clone(),
                    source,
                }),
        }
    }

    async fn serve(&self) -> Result<(), ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted {
                name: self.name.clone(),
            });
        }
        if self.closed.is_cancelled() {
            tracing::info!(server = %self.name, "Server closed before it started");
            return Ok(());
        }

        let listener = self.bind().await?;
        let local = listener.local_addr().map_err(|source| ServerError::LocalAddr {
            name: self.name.clone(),
            source,
        })?;
        let _ = self.local_addr.set(local);
        tracing::info!(server = %self.name, address = %local, "HTTP server listening");

        let app = self.build_router();
        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = self.closed.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(server = %self.name, error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                },
            };

            let guard = self.connections.track();
            tracing::debug!(
                server = %self.name,
                peer_addr = %peer,
                connection_id = %guard.id(),
                "Connection accepted"
            );
            self.connections.spawn(serve_connection(
                stream,
                app.clone(),
                self.closed.clone(),
                guard,
            ));
        }

        drop(listener);
        self.connections.wait_closed().await;
        tracing::info!(server = %self.name, "HTTP server stopped");
        Ok(())
    }
}

/// Serve one connection until the peer hangs up or the server is closed.
async fn serve_connection(
    stream: TcpStream,
    app: Router,
    closed: CancellationToken,
    guard: ConnectionGuard,
) {
    let builder = Builder::new(TokioExecutor::new());
    let connection =
        builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(app));

    tokio::select! {
        result = connection => {
            if let Err(e) = result {
                tracing::debug!(connection_id = %guard.id(), error = %e, "Connection error");
            }
        }
        _ = closed.cancelled() => {
            tracing::debug!(connection_id = %guard.id(), "Connection dropped by force close");
        }
    }
}

impl ManagedServer for HttpServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> String {
        match self.local_addr() {
            Some(addr) => addr.to_string(),
            None => self.address.clone(),
        }
    }

    fn start(&self) -> BoxFuture<'_, Result<(), ServerError>> {
        Box::pin(self.serve())
    }

    fn reject_new_traffic(&self) {
        if self.gate.close() {
            tracing::debug!(server = %self.name, "Rejection gate closed");
        }
    }

    fn force_close(&self) {
        if self.closed.is_cancelled() {
            tracing::debug!(server = %self.name, "Server already closed");
            return;
        }
        let open = self.connections.active_count();
        self.gate.close();
        self.closed.cancel();
        tracing::info!(
            server = %self.name,
            open_connections = open,
            "Server closed"
        );
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("name", &self.name)
            .field("address", &self.address())
            .field("rejecting", &self.is_rejecting())
            .field("closed", &self.closed.is_cancelled())
            .finish_non_exhaustive()
    }
}
