//! Middleware for the booking service.
//!
//! # Components
//!
//! - `auth` - Resolves the caller for the `/bookings` routes
//! - `http_metrics` - Records request counts and latency for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
