//! Booking lifecycle coordinator.
//!
//! Each operation is a short saga over three collaborators that share no
//! transaction: the location service's capacity counter, the notification
//! service, and the booking store.
//!
//! # Ordering and compensation
//!
//! - **create**: decrement capacity, then persist. If persisting fails and
//!   compensation is enabled, the decrement is undone with an increment.
//! - **cancel**: increment capacity, then delete. If the delete fails or
//!   finds no row, the increment is undone with a decrement.
//! - **extend**: a single atomic store update; capacity is untouched.
//!
//! A failed compensation is logged at error level and the operation still
//! reports the original failure.
//!
//! Notification failures after a committed change surface as
//! `BkError::Upstream` even though the change is kept.

use crate::errors::BkError;
use crate::models::{
    Booking, CreateBookingRequest, DeleteBookingResponse, ExtendBookingRequest, NewBooking,
    Notification,
};
use crate::observability::metrics::{record_booking_operation, record_compensation};
use crate::repositories::BookingStore;
use crate::services::location_client::LocationCapacity;
use crate::services::notification_client::Notifier;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const TARGET: &str = "bk.services.coordinator";

/// Orchestrates create, extend, cancel and list.
pub struct BookingCoordinator {
    store: Arc<dyn BookingStore>,
    location: Arc<dyn LocationCapacity>,
    notifier: Arc<dyn Notifier>,
    compensate_failed_create: bool,
}

impl BookingCoordinator {
    /// Create a coordinator.
    ///
    /// # Arguments
    ///
    /// * `compensate_failed_create` - release the decremented capacity when
    ///   persisting a new booking fails
    pub fn new(
        store: Arc<dyn BookingStore>,
        location: Arc<dyn LocationCapacity>,
        notifier: Arc<dyn Notifier>,
        compensate_failed_create: bool,
    ) -> Self {
        Self {
            store,
            location,
            notifier,
            compensate_failed_create,
        }
    }

    /// Create a booking for `owner_id`.
    ///
    /// `now` fixes "today" for the start-date check.
    ///
    /// # Errors
    ///
    /// - `Validation` - missing/invalid fields or a start date before today
    /// - `Capacity` - no free spaces, or the decrement conflicted
    /// - `Upstream` - location or notification call failed
    /// - `Persistence` - the record could not be written
    #[instrument(skip_all, name = "bk.booking.create")]
    pub async fn create(
        &self,
        owner_id: &str,
        request: &CreateBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking, BkError> {
        let result = self.create_inner(owner_id, request, now).await;
        record_outcome("create", &result);
        result
    }

    async fn create_inner(
        &self,
        owner_id: &str,
        request: &CreateBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking, BkError> {
        let draft = request.validate()?;

        let location = self.location.get_location(&draft.location_id).await?;
        if location.free_spaces <= 0 {
            return Err(BkError::Capacity(format!(
                "location {} has no free spaces",
                draft.location_id
            )));
        }

        if draft.start_time.date_naive() < now.date_naive() {
            return Err(BkError::Validation(
                "start_time cannot be before today".to_string(),
            ));
        }

        let end_time = draft
            .start_time
            .checked_add_signed(draft.duration)
            .ok_or_else(|| BkError::Validation("expires_hours is out of range".to_string()))?;

        self.location.decrement(&draft.location_id).await?;

        let new_booking = NewBooking {
            owner_id: owner_id.to_string(),
            location_id: draft.location_id.clone(),
            start_time: draft.start_time,
            end_time,
            street_address: location.street_address.clone(),
        };

        let booking = match self.store.insert(new_booking).await {
            Ok(booking) => booking,
            Err(e) => {
                error!(
                    target: TARGET,
                    error = %e,
                    location_id = %draft.location_id,
                    "Failed to persist booking after capacity decrement"
                );
                if self.compensate_failed_create {
                    self.release_capacity("create", &draft.location_id).await;
                } else {
                    warn!(
                        target: TARGET,
                        location_id = %draft.location_id,
                        "Compensation disabled; decremented capacity is not released"
                    );
                }
                return Err(into_persistence(e));
            }
        };

        info!(
            target: TARGET,
            booking_id = %booking.id,
            location_id = %booking.location_id,
            "Booking created"
        );

        self.notifier
            .notify(&Notification::booking_created(&booking, &location))
            .await?;

        Ok(booking)
    }

    /// Add `extend_hours` to an owned booking's end time.
    ///
    /// # Errors
    ///
    /// - `Validation` - missing or non-positive hours
    /// - `NotFound` - unknown id, or the booking belongs to someone else
    /// - `Upstream` - notification failed (the extension is kept)
    #[instrument(skip_all, name = "bk.booking.extend")]
    pub async fn extend(
        &self,
        owner_id: &str,
        booking_id: &str,
        request: &ExtendBookingRequest,
    ) -> Result<Booking, BkError> {
        let result = self.extend_inner(owner_id, booking_id, request).await;
        record_outcome("extend", &result);
        result
    }

    async fn extend_inner(
        &self,
        owner_id: &str,
        booking_id: &str,
        request: &ExtendBookingRequest,
    ) -> Result<Booking, BkError> {
        let hours = request.validate()?;
        let id = parse_booking_id(booking_id)?;

        let booking = self
            .store
            .extend_end_time(id, owner_id, hours)
            .await?
            .ok_or_else(booking_not_found)?;

        info!(
            target: TARGET,
            booking_id = %booking.id,
            hours = hours,
            "Booking extended"
        );

        self.notifier
            .notify(&Notification::booking_extended(&booking))
            .await?;

        Ok(booking)
    }

    /// Cancel an owned booking and return its capacity.
    ///
    /// # Errors
    ///
    /// - `NotFound` - unknown id, someone else's booking, or removed concurrently
    /// - `Upstream` - the capacity release failed (booking untouched)
    /// - `Persistence` - the delete failed after the release
    #[instrument(skip_all, name = "bk.booking.cancel")]
    pub async fn cancel(
        &self,
        owner_id: &str,
        booking_id: &str,
    ) -> Result<DeleteBookingResponse, BkError> {
        let result = self.cancel_inner(owner_id, booking_id).await;
        record_outcome("cancel", &result);
        result
    }

    async fn cancel_inner(
        &self,
        owner_id: &str,
        booking_id: &str,
    ) -> Result<DeleteBookingResponse, BkError> {
        let id = parse_booking_id(booking_id)?;

        let booking = self
            .store
            .find_for_owner(id, owner_id)
            .await?
            .ok_or_else(booking_not_found)?;

        self.location.increment(&booking.location_id).await?;

        match self.store.delete_for_owner(id, owner_id).await {
            Ok(true) => {
                info!(
                    target: TARGET,
                    booking_id = %id,
                    location_id = %booking.location_id,
                    "Booking cancelled"
                );
                Ok(DeleteBookingResponse::for_booking(id))
            }
            Ok(false) => {
                // Removed between lookup and delete (expiry sweep); the sweep
                // releases its own capacity, so take ours back.
                warn!(
                    target: TARGET,
                    booking_id = %id,
                    "Booking disappeared before delete"
                );
                self.reclaim_capacity("cancel", &booking.location_id).await;
                Err(booking_not_found())
            }
            Err(e) => {
                error!(
                    target: TARGET,
                    error = %e,
                    booking_id = %id,
                    "Failed to delete booking after capacity release"
                );
                self.reclaim_capacity("cancel", &booking.location_id).await;
                Err(into_persistence(e))
            }
        }
    }

    /// All bookings of `owner_id`, ordered by start time.
    #[instrument(skip_all, name = "bk.booking.list")]
    pub async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Booking>, BkError> {
        let result = self.store.list_for_owner(owner_id).await;
        record_outcome("list", &result);
        result
    }

    /// Undo a decrement. Failure is logged, never returned.
    async fn release_capacity(&self, operation: &str, location_id: &str) {
        match self.location.increment(location_id).await {
            Ok(()) => {
                record_compensation(operation, "success");
                info!(
                    target: TARGET,
                    location_id = %location_id,
                    "Compensating increment applied"
                );
            }
            Err(e) => {
                record_compensation(operation, "error");
                error!(
                    target: TARGET,
                    error = %e,
                    location_id = %location_id,
                    "Compensating increment failed; capacity counter is now low by one"
                );
            }
        }
    }

    /// Undo an increment. Failure is logged, never returned.
    async fn reclaim_capacity(&self, operation: &str, location_id: &str) {
        match self.location.decrement(location_id).await {
            Ok(()) => {
                record_compensation(operation, "success");
                info!(
                    target: TARGET,
                    location_id = %location_id,
                    "Compensating decrement applied"
                );
            }
            Err(e) => {
                record_compensation(operation, "error");
                error!(
                    target: TARGET,
                    error = %e,
                    location_id = %location_id,
                    "Compensating decrement failed; capacity counter is now high by one"
                );
            }
        }
    }
}

fn parse_booking_id(raw: &str) -> Result<Uuid, BkError> {
    Uuid::parse_str(raw).map_err(|_| booking_not_found())
}

fn booking_not_found() -> BkError {
    BkError::NotFound("Booking not found".to_string())
}

fn into_persistence(err: BkError) -> BkError {
    match err {
        BkError::Persistence(_) => err,
        other => BkError::Persistence(other.to_string()),
    }
}

fn record_outcome<T>(operation: &str, result: &Result<T, BkError>) {
    let status = match result {
        Ok(_) => "success",
        Err(e) => e.metric_label(),
    };
    record_booking_operation(operation, status);
}
