//! Middleware for observability.
//!
//! Request logging with latency tracking. The auth gate lives in
//! [`crate::auth::middleware`].

pub mod logging;

pub use logging::request_logging;
