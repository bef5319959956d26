//! Short link endpoints

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::database::AppState;
use crate::error::{AppError, Result};
use crate::recipes::get_recipe;

/// Issues a short link for a recipe page
///
/// The full path `/recipes/{id}/` is shortened; the same recipe always gets
/// the same link.
///
/// # Response
///
/// ```json
/// { "short-link": "http://localhost:8080/s/3f2a9c" }
/// ```
///
/// - **200 OK** - Link issued
/// - **404 Not Found** - Recipe does not exist
pub async fn get_link(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    if get_recipe(&state.db, id)?.is_none() {
        return Err(AppError::not_found(format!("recipe {} not found", id)));
    }

    let key = state.links.shorten(&format!("/recipes/{}/", id))?;
    Ok(Json(json!({ "short-link": key.to_url(&state.config.public_url) })))
}

/// Redirects a short link to the page it was issued for
///
/// # Response
///
/// - **307 Temporary Redirect** - `Location` holds the stored path
/// - **404 Not Found** - Unknown short key
pub async fn redirect_short_link(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    match state.links.restore(&key)? {
        Some(full_url) => {
            debug!(key = %key, target = %full_url, "short link followed");
            Ok(Redirect::temporary(&full_url))
        }
        None => Err(AppError::not_found("URL not found")),
    }
}
