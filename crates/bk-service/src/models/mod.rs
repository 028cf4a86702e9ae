//! Booking service models.
//!
//! Contains the persisted booking entity plus request and response types
//! for the HTTP surface and the upstream services.

use crate::errors::BkError;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Display format for times in notification text, e.g. "16 October 2026 at 10:00:00".
pub const NOTIFICATION_TIME_FORMAT: &str = "%-d %B %Y at %H:%M:%S";

/// A reservation of one unit of capacity at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    /// Store-assigned identifier.
    pub id: Uuid,

    /// User who created the booking.
    pub owner_id: String,

    /// Reserved location.
    pub location_id: String,

    /// When the reservation begins.
    pub start_time: DateTime<Utc>,

    /// When the reservation ends. Only ever moved forward.
    pub end_time: DateTime<Utc>,

    /// Location address captured at creation time.
    pub street_address: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Values needed to persist a new booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub owner_id: String,
    pub location_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub street_address: Option<String>,
}

// ============================================================================
// Booking API Models
// ============================================================================

/// Request body for `POST /bookings/create`.
///
/// Fields are optional at the serde level so that a missing field yields a
/// validation error rather than a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBookingRequest {
    pub location_id: Option<String>,

    /// ISO-8601 start instant. A value without offset is taken as UTC.
    pub start_time: Option<String>,

    /// Booking duration in hours. Fractional values are truncated.
    #[serde(default, deserialize_with = "whole_hours")]
    pub expires_hours: Option<i64>,
}

/// Validated form of [`CreateBookingRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDraft {
    pub location_id: String,
    pub start_time: DateTime<Utc>,
    pub duration: TimeDelta,
}

impl CreateBookingRequest {
    /// Check that every field is present and well-formed.
    pub fn validate(&self) -> Result<BookingDraft, BkError> {
        let location_id = self
            .location_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BkError::Validation("location_id is required".to_string()))?;

        let raw_start = self
            .start_time
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BkError::Validation("start_time is required".to_string()))?;

        let expires_hours = self
            .expires_hours
            .ok_or_else(|| BkError::Validation("expires_hours is required".to_string()))?;

        let start_time = parse_start_time(raw_start)?;
        let duration = hours_delta("expires_hours", expires_hours)?;

        if start_time.checked_add_signed(duration).is_none() {
            return Err(BkError::Validation(
                "expires_hours is out of range".to_string(),
            ));
        }

        Ok(BookingDraft {
            location_id: location_id.to_string(),
            start_time,
            duration,
        })
    }
}

/// Request body for `PUT /bookings/extend/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtendBookingRequest {
    /// Hours to add to the current end time. Fractional values are truncated.
    #[serde(default, deserialize_with = "whole_hours")]
    pub extend_hours: Option<i64>,
}

impl ExtendBookingRequest {
    /// Returns the validated number of hours to add.
    pub fn validate(&self) -> Result<i32, BkError> {
        let hours = self
            .extend_hours
            .ok_or_else(|| BkError::Validation("extend_hours is required".to_string()))?;

        hours_delta("extend_hours", hours)?;

        i32::try_from(hours)
            .map_err(|_| BkError::Validation("extend_hours is out of range".to_string()))
    }
}

/// Response body for `DELETE /bookings/delete/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBookingResponse {
    pub message: String,
}

impl DeleteBookingResponse {
    pub fn for_booking(id: Uuid) -> Self {
        Self {
            message: format!("Removed booking with id {}", id),
        }
    }
}

/// Health check response.
///
/// Returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Store connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

// ============================================================================
// Upstream Models
// ============================================================================

/// Location details returned by the location service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    /// Current free-space counter.
    pub free_spaces: i64,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub street_address: Option<String>,
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub title: String,
    pub description: String,
}

impl Notification {
    /// "Booking Created" notification for a freshly persisted booking.
    pub fn booking_created(booking: &Booking, location: &LocationInfo) -> Self {
        let title = match location.title.as_deref() {
            Some(name) => format!("Booking Created at {}", name),
            None => "Booking Created".to_string(),
        };
        let place = booking
            .street_address
            .as_deref()
            .map(|address| format!(" at {}", address))
            .unwrap_or_default();

        Self {
            user_id: booking.owner_id.clone(),
            title,
            description: format!(
                "You made a booking{} starting at {}. It expires at {}.",
                place,
                format_notification_time(booking.start_time),
                format_notification_time(booking.end_time)
            ),
        }
    }

    /// "Booking Extended" notification carrying the new end time.
    pub fn booking_extended(booking: &Booking) -> Self {
        Self {
            user_id: booking.owner_id.clone(),
            title: "Booking Extended".to_string(),
            description: format!(
                "Your booking has been extended to {}.",
                format_notification_time(booking.end_time)
            ),
        }
    }

    /// "Booking Expired" notification sent by the sweep.
    pub fn booking_expired(booking: &Booking) -> Self {
        Self {
            user_id: booking.owner_id.clone(),
            title: "Booking Expired".to_string(),
            description: "Your booking has now expired.".to_string(),
        }
    }
}

/// Format an instant for notification text (UTC).
pub fn format_notification_time(at: DateTime<Utc>) -> String {
    at.format(NOTIFICATION_TIME_FORMAT).to_string()
}

/// Parse an ISO-8601 start time. RFC 3339 values keep their offset; values
/// without an offset are interpreted as UTC.
pub fn parse_start_time(raw: &str) -> Result<DateTime<Utc>, BkError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            BkError::Validation("start_time must be an ISO-8601 date-time".to_string())
        })
}

/// Accept any JSON number of hours, truncated toward zero.
fn whole_hours<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    // `as` saturates; out-of-range values are rejected by validation
    Ok(Option::<f64>::deserialize(deserializer)?.map(|hours| hours.trunc() as i64))
}

fn hours_delta(field: &str, hours: i64) -> Result<TimeDelta, BkError> {
    if hours <= 0 {
        return Err(BkError::Validation(format!("{} must be positive", field)));
    }

    TimeDelta::try_hours(hours)
        .ok_or_else(|| BkError::Validation(format!("{} is out of range", field)))
}
