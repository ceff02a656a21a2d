use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cabshare_booking::{Booking, BookingError};
use cabshare_core::Money;

use crate::auth;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub ride_id: Uuid,
    pub seats: u32,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub rider_id: Uuid,
    pub seats: u32,
    pub fare_total: Money,
    pub deposit: Money,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            ride_id: b.ride_id,
            rider_id: b.rider_id,
            seats: b.seats,
            fare_total: b.fare_total,
            deposit: b.deposit,
            status: b.status.as_str().to_string(),
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/approve", post(approve_booking))
        .route("/v1/bookings/{id}/reject", post(reject_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let rider_id = auth::require_user(bearer, &state.auth.secret)?;

    let booking = state
        .orchestrator
        .create_booking(req.ride_id, rider_id, req.seats)
        .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// GET /v1/bookings
async fn list_bookings(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let rider_id = auth::require_user(bearer, &state.auth.secret)?;

    let bookings = state.orchestrator.bookings_for_rider(rider_id).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let user_id = auth::require_user(bearer, &state.auth.secret)?;

    let booking = state
        .orchestrator
        .get_booking(booking_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(BookingError::BookingNotFound.to_string()))?;
    if booking.rider_id != user_id {
        return Err(AppError::AuthorizationError(
            "Only the rider may view this booking".to_string(),
        ));
    }

    Ok(Json(booking.into()))
}

/// POST /v1/bookings/{id}/approve
async fn approve_booking(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let driver_id = auth::require_user(bearer, &state.auth.secret)?;

    let booking = state.orchestrator.approve(booking_id, driver_id).await?;
    Ok(Json(booking.into()))
}

/// POST /v1/bookings/{id}/reject
async fn reject_booking(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let driver_id = auth::require_user(bearer, &state.auth.secret)?;

    let booking = state.orchestrator.reject(booking_id, driver_id).await?;
    Ok(Json(booking.into()))
}

/// POST /v1/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let actor_id = auth::require_user(bearer, &state.auth.secret)?;

    let booking = state.orchestrator.cancel(booking_id, actor_id).await?;
    Ok(Json(booking.into()))
}
