//! HTTP request handlers for the booking service.

pub mod bookings;
pub mod health;
pub mod metrics;

pub use bookings::{cancel_booking, create_booking, extend_booking, list_bookings};
pub use health::health_check;
pub use metrics::metrics_handler;
