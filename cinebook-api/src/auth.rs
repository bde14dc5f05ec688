use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use cinebook_core::repository::StoreError;
use cinebook_core::user::{NewUser, Role, User};
use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email_address: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub mobile_number: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let (Some(email), Some(password)) = (non_empty(req.email_address), non_empty(req.password)) else {
        return Err(AppError::Validation(
            "Please provide email and password to continue.".to_string(),
        ));
    };

    let cost = state.bcrypt_cost;
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Error hashing password: {}", e)))?;

    let new_user = NewUser {
        username: format!("{}{}", req.first_name, req.last_name),
        email: email.into(),
        first_name: req.first_name,
        last_name: req.last_name,
        contact: req.mobile_number,
        role: req.role.unwrap_or_default(),
        password_hash: password_hash.into(),
        coupons: vec![state.signup_coupon.clone()],
    };

    let user = state.users.create_user(new_user).await.map_err(|e| match e {
        StoreError::Duplicate(_) => AppError::Conflict("Username already taken.".to_string()),
        other => AppError::from(cinebook_core::BookingError::from(other)),
    })?;

    info!(user_id = %user.id, username = %user.username, "user signed up");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (Some(username), Some(password)) = (non_empty(req.username), non_empty(req.password)) else {
        return Err(AppError::Validation("Please provide username and password.".to_string()));
    };

    let user = state
        .users
        .find_user_by_username(&username)
        .await
        .map_err(cinebook_core::BookingError::from)?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    let hash = user.password_hash.expose().clone();
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("stored password hash unreadable: {}", e)))?;

    if !matches {
        debug!(user_id = %user.id, "password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials.".to_string()));
    }

    let token = state
        .tokens
        .issue(user.id, user.role)
        .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))?;

    Ok(Json(AuthResponse { token }))
}

/// Tokens are stateless; the client drops its copy.
async fn logout() -> Json<Value> {
    Json(json!({ "message": "Logout successful." }))
}
