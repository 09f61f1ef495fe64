//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use graceful_shutdown::{HttpServer, ManagedServer};
use tokio::net::{TcpListener, TcpStream};

/// HTTP server bound to an ephemeral port, not started yet.
///
/// Routes: `/` answers "hello", `/slow/{ms}` answers "done" after sleeping.
pub async fn bound_server(name: &str) -> (Arc<HttpServer>, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = HttpServer::from_listener(name, listener)
        .unwrap()
        .route("/", get(|| async { "hello" }))
        .route(
            "/slow/{ms}",
            get(|axum::extract::Path(ms): axum::extract::Path<u64>| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                "done"
            }),
        );
    let server = Arc::new(server);
    let addr = server.local_addr().unwrap();
    (server, addr)
}

/// Bound server, started in the background and accepting.
#[allow(dead_code)]
pub async fn start_server(name: &str) -> (Arc<HttpServer>, SocketAddr) {
    let (server, addr) = bound_server(name).await;
    let running = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = running.start().await;
    });
    wait_listening(addr).await;

    (server, addr)
}

/// Poll until a TCP connect to `addr` succeeds.
#[allow(dead_code)]
pub async fn wait_listening(addr: SocketAddr) {
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server at {addr} never started listening");
}

/// Client without connection reuse, so every request opens a connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

#[allow(dead_code)]
pub fn as_managed(servers: &[Arc<HttpServer>]) -> Vec<Arc<dyn ManagedServer>> {
    servers
        .iter()
        .map(|s| Arc::clone(s) as Arc<dyn ManagedServer>)
        .collect()
}
