//! Background tasks for the booking service.
//!
//! # Tasks
//!
//! - `expiry_sweeper` - Removes expired bookings and releases their capacity

pub mod expiry_sweeper;

pub use expiry_sweeper::{run_sweep, start_expiry_sweeper, ExpirySweepConfig, SweepReport};
