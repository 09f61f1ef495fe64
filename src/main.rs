//! Graceful shutdown demo (v1)
//!
//! Runs two HTTP servers and two shutdown callbacks under the orchestrator.
//!
//! ```text
//!   Ctrl-C ──▶ reject new requests (503) ──▶ wait drain budget ──▶ close servers
//!          ──▶ run callbacks (shared budget) ──▶ release resources ──▶ exit 0
//!
//!   Ctrl-C again at any point      ──▶ exit 127
//!   shutdown deadline passes first ──▶ exit 1
//! ```
//!
//! Start it from a terminal; some IDE run consoles swallow the signals.

use std::net::SocketAddr;
use std::time::Duration;

use axum::routing::get;
use clap::Parser;

use graceful_shutdown::config::schema::{
    DEFAULT_CALLBACK_BUDGET, DEFAULT_DRAIN_BUDGET, DEFAULT_SHUTDOWN_DEADLINE,
};
use graceful_shutdown::observability::{logging, metrics};
use graceful_shutdown::{App, HttpServer, ShutdownContext};

#[derive(Parser)]
#[command(name = "graceful-shutdown")]
#[command(about = "Multi-server graceful shutdown demo", long_about = None)]
struct Cli {
    /// Address of the business server.
    #[arg(long, default_value = "127.0.0.1:8080")]
    business_addr: String,

    /// Address of the admin server.
    #[arg(long, default_value = "127.0.0.1:8081")]
    admin_addr: String,

    /// Overall shutdown budget in seconds.
    #[arg(long, default_value_t = DEFAULT_SHUTDOWN_DEADLINE.as_secs())]
    shutdown_deadline_secs: u64,

    /// Time in-flight requests get before servers are closed, in seconds.
    #[arg(long, default_value_t = DEFAULT_DRAIN_BUDGET.as_secs())]
    drain_budget_secs: u64,

    /// Time all shutdown callbacks get, in seconds.
    #[arg(long, default_value_t = DEFAULT_CALLBACK_BUDGET.as_secs())]
    callback_budget_secs: u64,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(logging::DEFAULT_FILTER);

    tracing::info!("graceful-shutdown v0.1.0 starting");

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr);
    }

    let business = HttpServer::new("business", cli.business_addr)
        .route("/", get(|| async { "hello" }));
    let admin = HttpServer::new("admin", cli.admin_addr);

    let app = App::builder()
        .server(business)
        .server(admin)
        .shutdown_deadline(Duration::from_secs(cli.shutdown_deadline_secs))
        .drain_budget(Duration::from_secs(cli.drain_budget_secs))
        .callback_budget(Duration::from_secs(cli.callback_budget_secs))
        .callback("store-cache-to-db", store_cache_to_db)
        .callback("second-callback", second_callback)
        .cleanup("connection-pools", || {
            tracing::info!("Releasing pooled connections");
        })
        .build();

    match app.start_and_serve().await? {}
}

/// Needs 5s against a default 3s budget, so it reports a timeout.
async fn store_cache_to_db(ctx: ShutdownContext) {
    tracing::info!("Flushing local cache to the database, this takes about 5s");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(5)) => {
            tracing::info!("Cache flushed to the database");
        }
        _ = ctx.done() => {
            tracing::warn!("Cache flush timed out");
        }
    }
}

/// Finishes well inside the default budget.
async fn second_callback(ctx: ShutdownContext) {
    tracing::info!("Second callback running");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(2)) => {
            tracing::info!("Second callback finished");
        }
        _ = ctx.done() => {
            tracing::warn!("Second callback timed out");
        }
    }
}
