//! Request guards
//!
//! Authentication itself happens upstream. This module only checks the
//! optional shared secret on `/api` and resolves the acting user from the
//! `X-User-Id` header the upstream layer sets.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::catalog::get_user;
use crate::database::AppState;
use crate::error::AppError;
use crate::model::User;

/// Header carrying the id of the user making the request
pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware to check for Authorization header
///
/// If an API key is configured, the request must carry an `Authorization`
/// header with exactly that value. Without a configured key the check is
/// skipped.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    if let Some(secret) = state.config.api_key.as_deref() {
        let provided = headers
            .get("Authorization")
            .and_then(|value| value.to_str().ok());

        if provided != Some(secret) {
            warn!(path = %request.uri().path(), "rejected request with bad authorization header");
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Unauthorized",
                    "message": "Invalid or missing authorization header"
                })),
            )
                .into_response());
        }
    }

    Ok(next.run(request).await)
}

/// Looks up the user named by `X-User-Id`, if any.
fn acting_user(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    let id: u64 = raw
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .ok_or(AppError::Unauthenticated)?;

    get_user(&state.db, id)?
        .map(Some)
        .ok_or(AppError::Unauthenticated)
}

/// The authenticated user; rejects with 401 when absent.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        acting_user(parts, state)?
            .map(CurrentUser)
            .ok_or(AppError::Unauthenticated)
    }
}

/// The acting user for endpoints that also serve anonymous visitors.
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn id(&self) -> Option<u64> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        acting_user(parts, state).map(Viewer)
    }
}
