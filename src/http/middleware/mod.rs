//! Request middleware.

pub mod reject;

pub use reject::{reject_middleware, RejectGate, SHUTTING_DOWN_BODY};
