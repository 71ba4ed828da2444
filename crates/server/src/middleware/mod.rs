//! HTTP middleware stack for the server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. `TraceLayer` (request tracing)
//! 2. Rate limiting (governor) on the public subscription endpoints
//!
//! The governor limiter is an HTTP-edge defense against abusive clients; it
//! is independent of the per-contact token issuance limit, which lives in
//! the verification service and is enforced against the database.

pub mod rate_limit;

pub use rate_limit::{api_rate_limiter, subscribe_rate_limiter};
