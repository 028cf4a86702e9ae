//! Booking handlers.
//!
//! Implements the authenticated booking endpoints:
//!
//! - `POST /bookings/create` - Create a booking
//! - `DELETE /bookings/delete/:id` - Cancel a booking
//! - `PUT /bookings/extend/:id` - Extend a booking
//! - `GET /bookings/getAllBookings` - List the caller's bookings
//!
//! Every handler acts on behalf of the [`AuthenticatedUser`] injected by
//! `require_auth`; a booking owned by someone else is reported as not found.

use crate::auth::AuthenticatedUser;
use crate::errors::BkError;
use crate::models::{
    Booking, CreateBookingRequest, DeleteBookingResponse, ExtendBookingRequest,
};
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::instrument;

/// Deserialize a JSON body, reporting failures as 400 rather than Axum's 422.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, BkError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "bk.handlers.bookings", error = %e, "Invalid request body");
        BkError::Validation("Invalid request body".to_string())
    })
}

/// Handler for POST /bookings/create
///
/// # Response
///
/// - 200 OK: the created booking
/// - 400 Bad Request: missing fields, unparseable start time, start date before today
/// - 500 Internal Server Error: no capacity, upstream or persistence failure
#[instrument(
    skip_all,
    name = "bk.booking.create_handler",
    fields(method = "POST", endpoint = "/bookings/create")
)]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Bytes,
) -> Result<Json<Booking>, BkError> {
    let request: CreateBookingRequest = parse_body(&body)?;

    let booking = state
        .coordinator
        .create(&user.user_id, &request, Utc::now())
        .await?;

    Ok(Json(booking))
}

/// Handler for DELETE /bookings/delete/:id
///
/// # Response
///
/// - 200 OK: `{"message": "Removed booking with id <id>"}`
/// - 400 Bad Request: unknown id or not the caller's booking
/// - 500 Internal Server Error: capacity release or delete failed
#[instrument(
    skip_all,
    name = "bk.booking.cancel_handler",
    fields(method = "DELETE", endpoint = "/bookings/delete/{id}")
)]
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(booking_id): Path<String>,
) -> Result<Json<DeleteBookingResponse>, BkError> {
    let response = state.coordinator.cancel(&user.user_id, &booking_id).await?;
    Ok(Json(response))
}

/// Handler for PUT /bookings/extend/:id
///
/// # Response
///
/// - 200 OK: the booking with its new end time
/// - 400 Bad Request: invalid hours, unknown id or not the caller's booking
/// - 500 Internal Server Error: persistence or notification failure
#[instrument(
    skip_all,
    name = "bk.booking.extend_handler",
    fields(method = "PUT", endpoint = "/bookings/extend/{id}")
)]
pub async fn extend_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(booking_id): Path<String>,
    body: Bytes,
) -> Result<Json<Booking>, BkError> {
    let request: ExtendBookingRequest = parse_body(&body)?;

    let booking = state
        .coordinator
        .extend(&user.user_id, &booking_id, &request)
        .await?;

    Ok(Json(booking))
}

/// Handler for GET /bookings/getAllBookings
#[instrument(
    skip_all,
    name = "bk.booking.list_handler",
    fields(method = "GET", endpoint = "/bookings/getAllBookings")
)]
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<Booking>>, BkError> {
    let bookings = state.coordinator.list_for_owner(&user.user_id).await?;
    Ok(Json(bookings))
}
