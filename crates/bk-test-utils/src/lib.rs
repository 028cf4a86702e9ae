//! # Booking Test Utilities
//!
//! Shared test utilities for the booking service.
//!
//! This crate provides:
//! - Server test harness (`TestBookingServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bk_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let location = wiremock::MockServer::start().await;
//!     let notification = wiremock::MockServer::start().await;
//!     let server = TestBookingServer::spawn(&location.uri(), &notification.uri()).await?;
//!
//!     let response = reqwest::get(format!("{}/health", server.url())).await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
