use axum::{
    extract::{Extension, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use cinebook_core::BookingError;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/coupons", get(list_coupons))
}

async fn list_coupons(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .users
        .get_user(user_id)
        .await
        .map_err(BookingError::from)?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    if user.coupons.is_empty() {
        return Ok(Json(json!({ "message": "You don't have any coupons to use." })));
    }
    Ok(Json(json!({ "coupons": user.coupons })))
}
