//! Repository layer for the booking service.
//!
//! Handlers and services reach the `bookings` table only through the
//! [`BookingStore`] trait so that tests and the server harness can swap in
//! the in-memory store.

pub mod bookings;

pub use bookings::{mock::InMemoryBookingStore, BookingStore, PgBookingStore};
