use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use marina_booking::{Booking, BookingStatus, CreateBooking, CrewRating};
use marina_core::Actor;
use marina_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    boat_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    passenger_count: i32,
    contact_name: String,
    contact_phone: Masked<String>,
    user_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    crew_id: Uuid,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CancelRequest {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RatingRequest {
    rating: i32,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<BookingStatus>,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl ListQuery {
    fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.page_size
    }
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    available: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/merchant/bookings", get(list_merchant_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/confirm", post(confirm_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/complete", post(complete_booking))
        .route("/v1/bookings/{id}/rating", post(rate_booking))
        .route("/v1/boats/{id}/availability", get(check_availability))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .create(
            &actor,
            CreateBooking {
                boat_id: req.boat_id,
                start_time: req.start_time,
                end_time: req.end_time,
                passenger_count: req.passenger_count,
                contact_name: req.contact_name,
                contact_phone: req.contact_phone.into_inner(),
                user_notes: req.user_notes,
            },
        )
        .await?;
    Ok(Json(booking))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(&actor, id).await?))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .bookings
        .list_for_user(&actor, query.status, query.page_size, query.offset())
        .await?;
    Ok(Json(bookings))
}

async fn list_merchant_bookings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .bookings
        .list_for_merchant(&actor, query.status, query.page_size, query.offset())
        .await?;
    Ok(Json(bookings))
}

async fn confirm_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.confirm(&actor, id, req.crew_id, req.notes).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.cancel(&actor, id, req.reason).await?))
}

async fn complete_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.complete(&actor, id).await?))
}

async fn rate_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<RatingRequest>,
) -> Result<Json<CrewRating>, AppError> {
    Ok(Json(state.bookings.rate_crew(&actor, id, req.rating, req.comment).await?))
}

async fn check_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let available = state
        .bookings
        .check_availability(id, query.start_time, query.end_time)
        .await?;
    Ok(Json(AvailabilityResponse { available }))
}
