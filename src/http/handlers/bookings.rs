use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::domain::booking::BookingStatus;
use crate::domain::payment::{BookingDetails, CustomerInfo};
use crate::error::PaymentError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FreeBookingRequest {
    pub customer: CustomerInfo,
    pub details: BookingDetails,
}

/// Zero-price bookings skip the gateway round-trip and confirm immediately.
pub async fn create_free_booking(
    State(state): State<AppState>,
    Json(req): Json<FreeBookingRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_details(&req.details) {
        return e.into_response();
    }

    match state
        .reconciler
        .record_free_booking(&req.customer, &req.details)
        .await
    {
        Ok(booking) => (axum::http::StatusCode::CREATED, Json(booking)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(ref_number): Path<String>,
) -> impl IntoResponse {
    match state.bookings_repo.find_by_ref(&ref_number).await {
        Ok(Some(booking)) => (axum::http::StatusCode::OK, Json(booking)).into_response(),
        Ok(None) => PaymentError::NotFound(format!("booking {ref_number}")).into_response(),
        Err(e) => PaymentError::persistence(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

/// Venue-ops transition (complete a finished session, cancel a pending one).
/// Behind the internal API key; illegal edges come back as 409.
pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(ref_number): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> impl IntoResponse {
    match state
        .bookings_repo
        .update_status(&ref_number, req.status)
        .await
    {
        Ok(booking) => (axum::http::StatusCode::OK, Json(booking)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn validate_details(details: &BookingDetails) -> Result<(), PaymentError> {
    if details.end_time <= details.start_time {
        return Err(PaymentError::InvalidRequest(
            "slot end must be after slot start".into(),
        ));
    }
    if details.people <= 0 {
        return Err(PaymentError::InvalidRequest("people must be > 0".into()));
    }
    Ok(())
}
