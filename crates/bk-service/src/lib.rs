//! Booking Service Library
//!
//! Coordinates the lifecycle of parking bookings across three collaborators
//! that share no transaction:
//!
//! - the location service, which owns each location's free-space counter
//! - the notification service, which informs users of lifecycle events
//! - the booking store (PostgreSQL)
//!
//! # Architecture
//!
//! Handler -> Coordinator -> (Store, Location client, Notifier):
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/booking_coordinator.rs -> repositories/*.rs
//!                                                                   -> services/*_client.rs
//! ```
//!
//! The expiry sweeper (`tasks::expiry_sweeper`) runs on its own timer and
//! uses the same store and clients.
//!
//! # Modules
//!
//! - `auth` - Caller identity from HS512 bearer tokens
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Auth and HTTP metrics middleware
//! - `models` - Records, request bodies and notification payloads
//! - `observability` - Prometheus metrics
//! - `repositories` - Booking store
//! - `routes` - Axum router setup
//! - `services` - Coordinator and upstream clients
//! - `tasks` - Background tasks

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tasks;
