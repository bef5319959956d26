//! User and subscription endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use redb::Database;
use serde_json::json;

use super::page;
use crate::catalog;
use crate::database::AppState;
use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::middleware::{CurrentUser, Viewer};
use crate::model::{
    AvatarRequest, CreateUserRequest, PageParams, RecipeSummary, SubscriptionParams,
    SubscriptionView, User,
};
use crate::recipes::{recipes_by_author, user_view};
use crate::relations;

/// Builds the card of a followed author with at most `recipes_limit` recipes.
fn subscription_view(
    db: &Database,
    author: User,
    viewer: u64,
    recipes_limit: Option<usize>,
) -> Result<SubscriptionView> {
    let recipes = recipes_by_author(db, author.id)?;
    let recipes_count = recipes.len();
    let shown = recipes_limit.unwrap_or(recipes_count);

    Ok(SubscriptionView {
        user: user_view(db, author, Some(viewer))?,
        recipes: recipes.iter().take(shown).map(RecipeSummary::from).collect(),
        recipes_count,
    })
}

/// Registers a new user
///
/// # Request Body
///
/// ```json
/// { "email": "cook@example.com", "username": "cook", "first_name": "Julia", "last_name": "Child" }
/// ```
///
/// # Response
///
/// - **201 Created** - User registered
/// - **400 Bad Request** - Invalid fields, or email/username already taken
pub async fn create_user(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> Result<impl IntoResponse> {
    let user = catalog::create_user(&state.db, payload)?;
    Ok((StatusCode::CREATED, Json(user_view(&state.db, user, None)?)))
}

pub async fn list_users(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse> {
    let (page_no, limit, offset) = state.config.paginate(params.page, params.limit);
    let (count, users) = catalog::list_users(&state.db, offset, limit)?;

    let views = users
        .into_iter()
        .map(|user| user_view(&state.db, user, viewer.id()))
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(page(page_no, limit, count, views)))
}

pub async fn get_user(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<impl IntoResponse> {
    let user = catalog::get_user(&state.db, id)?
        .ok_or_else(|| AppError::not_found(format!("user {} not found", id)))?;
    Ok(Json(user_view(&state.db, user, viewer.id())?))
}

/// Returns the acting user's own profile.
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse> {
    Ok(Json(user_view(&state.db, user, None)?))
}

/// Sets the acting user's avatar
///
/// # Request Body
///
/// ```json
/// { "avatar": "data:image/png;base64,..." }
/// ```
///
/// # Response
///
/// - **200 OK** - `{"avatar": "..."}`
/// - **400 Bad Request** - Blank avatar
pub async fn set_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<AvatarRequest>,
) -> Result<impl IntoResponse> {
    let user = catalog::set_avatar(&state.db, user.id, Some(payload.avatar))?;
    Ok(Json(json!({ "avatar": user.avatar })))
}

/// Removes the acting user's avatar. Always 204, even if none was set.
pub async fn delete_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse> {
    catalog::set_avatar(&state.db, user.id, None)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Subscribes the acting user to an author
///
/// # Query Parameters
///
/// - `recipes_limit` (optional) - How many of the author's recipes to include
///
/// # Response
///
/// - **201 Created** - Subscription view of the author
/// - **400 Bad Request** - Self-subscription or already subscribed
/// - **404 Not Found** - Author does not exist
pub async fn subscribe(
    Path(author_id): Path<u64>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SubscriptionParams>,
) -> Result<impl IntoResponse> {
    let author = relations::follow(&state.db, user.id, author_id)?;
    let view = subscription_view(&state.db, author, user.id, params.recipes_limit)?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn unsubscribe(
    Path(author_id): Path<u64>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse> {
    relations::unfollow(&state.db, user.id, author_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lists the authors the acting user is subscribed to
///
/// # Example Request
///
/// `GET /api/users/subscriptions?page=1&limit=6&recipes_limit=3`
pub async fn subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SubscriptionParams>,
) -> Result<impl IntoResponse> {
    let (page_no, limit, offset) = state.config.paginate(params.page, params.limit);
    let author_ids = relations::following_ids(&state.db, user.id)?;
    let count = author_ids.len();

    let mut views = Vec::new();
    for author_id in author_ids.into_iter().skip(offset).take(limit) {
        if let Some(author) = catalog::get_user(&state.db, author_id)? {
            views.push(subscription_view(
                &state.db,
                author,
                user.id,
                params.recipes_limit,
            )?);
        }
    }
    Ok(Json(page(page_no, limit, count, views)))
}
