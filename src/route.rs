//! Route definitions for the recipe API
//!
//! Short link redirects are public. Everything else lives under `/api` behind
//! the shared-secret check.

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;

use crate::database::AppState;
use crate::handler::{catalog, links, recipes, users};
use crate::middleware::auth_middleware;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `GET /s/{key}` - Redirects a short link to its recipe page (public)
/// - `GET|POST /api/users`, `GET /api/users/{id}`, `GET /api/users/me`
/// - `PUT|DELETE /api/users/me/avatar`
/// - `GET /api/users/subscriptions`, `POST|DELETE /api/users/{id}/subscribe`
/// - `GET|POST /api/tags`, `GET /api/tags/{id}`
/// - `GET|POST /api/ingredients`, `GET /api/ingredients/{id}`
/// - `GET|POST /api/recipes`, `GET|PUT|PATCH|DELETE /api/recipes/{id}`
/// - `POST|DELETE /api/recipes/{id}/favorite`, `POST|DELETE /api/recipes/{id}/shopping_cart`
/// - `GET /api/recipes/{id}/get-link`, `GET /api/recipes/download_shopping_cart`
///
/// # Example Usage
///
/// ```no_run
/// # use foodgram::config::Config;
/// # use foodgram::database::{init_db, AppState};
/// # use foodgram::route::create_app;
/// # let db = init_db("data.db").unwrap();
/// let app = create_app(AppState::new(db, Config::default()));
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/me", get(users::me))
        .route(
            "/users/me/avatar",
            put(users::set_avatar).delete(users::delete_avatar),
        )
        .route("/users/subscriptions", get(users::subscriptions))
        .route("/users/{id}", get(users::get_user))
        .route(
            "/users/{id}/subscribe",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route("/tags", get(catalog::list_tags).post(catalog::create_tag))
        .route("/tags/{id}", get(catalog::get_tag))
        .route(
            "/ingredients",
            get(catalog::list_ingredients).post(catalog::create_ingredient),
        )
        .route("/ingredients/{id}", get(catalog::get_ingredient))
        .route(
            "/recipes",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/recipes/download_shopping_cart",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/recipes/{id}",
            get(recipes::get_recipe)
                .put(recipes::update_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/recipes/{id}/favorite",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/recipes/{id}/shopping_cart",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        .route("/recipes/{id}/get-link", get(links::get_link))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/s/{key}", get(links::redirect_short_link))
        .nest("/api", api_routes)
        .with_state(state)
}
