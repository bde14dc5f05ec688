use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated caller, placed in the request extensions.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Unauthorized.".to_string()))?;

    let user_id = state.identity.resolve(token).await?;

    req.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(req).await)
}
