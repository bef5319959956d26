//! Tag and ingredient endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::catalog;
use crate::database::AppState;
use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::model::{CreateIngredientRequest, CreateTagRequest, IngredientSearchParams};

pub async fn create_tag(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateTagRequest>,
) -> Result<impl IntoResponse> {
    let tag = catalog::create_tag(&state.db, payload)?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// Lists every tag, alphabetically. Tags are few, so this is not paginated.
pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(catalog::list_tags(&state.db)?))
}

pub async fn get_tag(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    catalog::get_tag(&state.db, id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("tag {} not found", id)))
}

pub async fn create_ingredient(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateIngredientRequest>,
) -> Result<impl IntoResponse> {
    let ingredient = catalog::create_ingredient(&state.db, payload)?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

/// Searches ingredients by name
///
/// # Example Request
///
/// `GET /api/ingredients?name=sug`
///
/// Names starting with the query are listed before names that only contain it.
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(params): Query<IngredientSearchParams>,
) -> Result<impl IntoResponse> {
    Ok(Json(catalog::search_ingredients(
        &state.db,
        params.name.as_deref(),
    )?))
}

pub async fn get_ingredient(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    catalog::get_ingredient(&state.db, id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("ingredient {} not found", id)))
}
