//! Graceful shutdown orchestration for multi-server applications.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod server;

pub use config::ShutdownConfig;
pub use http::HttpServer;
pub use lifecycle::{App, AppBuilder, ExitOutcome, ShutdownContext};
pub use server::{ManagedServer, ServerError};
