//! Recipe endpoints, favorites, shopping cart and the shopping list download

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::Query;
use tracing::info;

use super::page;
use crate::aggregator::ShoppingList;
use crate::database::AppState;
use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::middleware::{CurrentUser, Viewer};
use crate::model::{RecipeListParams, RecipeRequest, RecipeSummary, RelationKind};
use crate::recipes::{self, recipe_view, recipe_views};
use crate::relations;

/// Lists recipes with pagination and filters
///
/// # Query Parameters
///
/// - `page` (optional) - Page number, starts from 1 (default: 1)
/// - `limit` (optional) - Items per page, max 100 (default: `PAGE_SIZE`)
/// - `author` (optional) - Only recipes by this user id
/// - `tags` (optional, repeatable) - Tag slugs, any of which must match; `tags=a,b` also works
/// - `is_favorited` / `is_in_shopping_cart` (optional) - `1` or `0`, relative to the acting user
///
/// # Example Request
///
/// `GET /api/recipes?tags=breakfast&tags=lunch&is_favorited=1&page=2`
///
/// Results are ordered newest first.
pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<RecipeListParams>,
) -> Result<impl IntoResponse> {
    let (page_no, limit, offset) = state.config.paginate(params.page, params.limit);
    let (count, found) = recipes::list_recipes(&state.db, &params, viewer.id(), offset, limit)?;
    let views = recipe_views(&state.db, found, viewer.id())?;
    Ok(Json(page(page_no, limit, count, views)))
}

/// Publishes a recipe authored by the acting user
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Pancakes",
///   "text": "Mix and fry.",
///   "image": "data:image/png;base64,...",
///   "cooking_time": 20,
///   "tags": [1, 2],
///   "ingredients": [{"id": 3, "amount": 200}]
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - Full recipe view
/// - **400 Bad Request** - Validation failed
/// - **401 Unauthorized** - No acting user
pub async fn create_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<RecipeRequest>,
) -> Result<impl IntoResponse> {
    let recipe = recipes::create_recipe(&state.db, user.id, payload)?;
    let view = recipe_view(&state.db, recipe, Some(user.id))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_recipe(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<impl IntoResponse> {
    let recipe = recipes::get_recipe(&state.db, id)?
        .ok_or_else(|| AppError::not_found(format!("recipe {} not found", id)))?;
    Ok(Json(recipe_view(&state.db, recipe, viewer.id())?))
}

/// Replaces a recipe. Only its author may do this (403 otherwise).
pub async fn update_recipe(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<RecipeRequest>,
) -> Result<impl IntoResponse> {
    let recipe = recipes::update_recipe(&state.db, id, user.id, payload)?;
    Ok(Json(recipe_view(&state.db, recipe, Some(user.id))?))
}

pub async fn delete_recipe(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse> {
    recipes::delete_recipe(&state.db, id, user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add(state: AppState, kind: RelationKind, user_id: u64, recipe_id: u64) -> Result<impl IntoResponse> {
    let recipe = relations::add_relation(&state.db, kind, user_id, recipe_id)?;
    Ok((StatusCode::CREATED, Json(RecipeSummary::from(&recipe))))
}

async fn remove(state: AppState, kind: RelationKind, user_id: u64, recipe_id: u64) -> Result<impl IntoResponse> {
    relations::remove_relation(&state.db, kind, user_id, recipe_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Adds a recipe to the acting user's favorites
///
/// # Response
///
/// - **201 Created** - Recipe summary
/// - **400 Bad Request** - Already in favorites
/// - **404 Not Found** - Recipe does not exist
pub async fn add_favorite(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse> {
    add(state, RelationKind::Favorite, user.id, id).await
}

pub async fn remove_favorite(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse> {
    remove(state, RelationKind::Favorite, user.id, id).await
}

pub async fn add_to_cart(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse> {
    add(state, RelationKind::Cart, user.id, id).await
}

pub async fn remove_from_cart(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse> {
    remove(state, RelationKind::Cart, user.id, id).await
}

/// Downloads the acting user's shopping list
///
/// Every ingredient of every recipe in the cart is merged into one line per
/// ingredient name:
///
/// ```text
/// Flour (g) — 500
/// Sugar (g) — 100
/// ```
///
/// An empty cart yields an empty file.
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse> {
    let recipe_ids = relations::recipe_ids(&state.db, RelationKind::Cart, user.id)?;
    let list = ShoppingList::for_recipes(state.db.as_ref(), &recipe_ids)?;

    info!(
        user_id = user.id,
        recipes = recipe_ids.len(),
        lines = list.len(),
        "shopping list rendered"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"shopping_list.txt\"",
            ),
        ],
        list.to_string(),
    ))
}
