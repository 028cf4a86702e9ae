//! Services for the booking service.
//!
//! - `booking_coordinator` - Create/extend/cancel/list sagas
//! - `location_client` - Location service capacity client
//! - `notification_client` - Notification service client

pub mod booking_coordinator;
pub mod location_client;
pub mod notification_client;

pub use booking_coordinator::BookingCoordinator;
pub use location_client::{mock::MockLocationClient, LocationCapacity, LocationClient};
pub use notification_client::{mock::MockNotifier, NotificationClient, Notifier};
