use axum::{
    extract::{Extension, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use tracing::info;
use cinebook_core::booking::{BookingIntent, BookingReceipt};
use cinebook_core::user::BookingRequest;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub movie_id: Uuid,
    pub show_id: i32,
    pub seats: i32,
    pub coupon_code: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/bookings", get(list_bookings).post(create_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<BookingReceipt>, AppError> {
    let intent = BookingIntent {
        user_id,
        movie_id: req.movie_id,
        show_id: req.show_id,
        seats: req.seats,
        coupon_code: req.coupon_code,
    };

    let receipt = state.bookings.book(&intent).await?;
    info!(%user_id, reference_number = %receipt.reference_number, "booking confirmed");
    Ok(Json(receipt))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<BookingRequest>>, AppError> {
    Ok(Json(state.bookings.history(user_id).await?))
}
