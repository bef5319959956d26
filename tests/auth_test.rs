use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use foodgram::config::Config;
use foodgram::database::{init_db, AppState};
use foodgram::route::create_app;

fn setup_test_app(api_key: Option<&str>) -> (Router, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = temp_db.path().to_str().unwrap();
    let db = init_db(db_path).expect("Failed to initialize test database");
    let config = Config {
        api_key: api_key.map(str::to_string),
        ..Config::default()
    };
    (create_app(AppState::new(db, config)), temp_db)
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

fn create_tag_request(authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/tags")
        .header("content-type", "application/json");
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }
    builder
        .body(Body::from(
            json!({ "name": "Breakfast", "slug": "breakfast" }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_auth_middleware_enabled_valid_token() {
    let (app, _temp_db) = setup_test_app(Some("secret_token"));

    let response = app
        .oneshot(create_tag_request(Some("secret_token")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_auth_middleware_enabled_invalid_token() {
    let (app, _temp_db) = setup_test_app(Some("secret_token"));

    let response = app
        .oneshot(create_tag_request(Some("wrong_token")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_auth_middleware_enabled_missing_token() {
    let (app, _temp_db) = setup_test_app(Some("secret_token"));

    let response = app.oneshot(create_tag_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["message"], "Invalid or missing authorization header");
}

#[tokio::test]
async fn test_auth_middleware_disabled() {
    let (app, _temp_db) = setup_test_app(None);

    let response = app.oneshot(create_tag_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_short_link_redirect_skips_auth() {
    let (app, _temp_db) = setup_test_app(Some("secret_token"));

    // Unknown key, but the request must reach the handler rather than the guard
    let response = app
        .oneshot(
            Request::builder()
                .uri("/s/abc123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "URL not found");
}

#[test]
fn test_config_from_env_treats_empty_key_as_disabled() {
    // Only this test touches AUTHORIZATION, so it cannot race the others
    std::env::set_var("AUTHORIZATION", "");
    assert!(Config::from_env().api_key.is_none());

    std::env::set_var("AUTHORIZATION", "secret_token");
    assert_eq!(Config::from_env().api_key.as_deref(), Some("secret_token"));

    std::env::remove_var("AUTHORIZATION");
}
