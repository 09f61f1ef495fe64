//! HTTP managed servers.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, hyper HTTP/1.1 + HTTP/2)
//!     → TraceLayer → request.rs (x-request-id)
//!     → middleware/reject.rs (503 once shutdown began)
//!     → application routes
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use middleware::{RejectGate, SHUTTING_DOWN_BODY};
pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::HttpServer;
