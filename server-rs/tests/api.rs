use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use webpadel_api::cache::Cache;
use webpadel_api::config::Config;
use webpadel_api::middleware::auth::generate_tokens;
use webpadel_api::{build_router, db, AppState};

fn test_config() -> Config {
    let mut config = Config::from_env();
    config.jwt.secret = "integration-secret".into();
    config.mail.api_url = String::new();
    config.mailing_list.api_key = String::new();
    config
}

/// Router over a pool that never connects unless a handler reaches the
/// database, so these tests only cover what is decided before any query.
fn app_with(config: Config) -> Router {
    let pool = db::create_lazy_pool(&config).expect("lazy pool");
    build_router(AppState::new(config, pool, Cache::disabled()))
}

fn app() -> Router {
    app_with(test_config())
}

async fn send(app: Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn profile_requires_a_token() {
    let (status, body) = send(app(), Method::GET, "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No token provided");
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let config = test_config();
    let (_, refresh) = generate_tokens(Uuid::new_v4(), None, &config.jwt).unwrap();

    let (status, body) =
        send(app_with(config), Method::GET, "/api/v1/friends", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Access token required");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let mut other = test_config();
    other.jwt.secret = "someone-else".into();
    let (access, _) = generate_tokens(Uuid::new_v4(), None, &other.jwt).unwrap();

    let (status, _) = send(app(), Method::GET, "/api/v1/notifications", Some(&access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn creating_an_event_needs_a_user() {
    let (status, body) = send(
        app(),
        Method::POST,
        "/api/v1/events",
        None,
        Some(json!({"title": "Sunday padel"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn joining_anonymously_is_unauthorized() {
    let uri = format!("/api/v1/events/{}/join", Uuid::new_v4());
    let (status, _) = send(app(), Method::POST, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_reports_the_failing_step() {
    let (status, body) = send(
        app(),
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "email": "ana@example.com",
            "password": "secret1",
            "confirmPassword": "secret2",
            "displayName": "Ana",
            "level": "beginner",
            "sports": ["padel"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["step"], "account");
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(body["error"], "Passwords do not match");

    let (status, body) = send(
        app(),
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "email": "ana@example.com",
            "password": "secret1",
            "confirmPassword": "secret1",
            "displayName": "Ana",
            "level": "beginner",
            "sports": [],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["step"], "preferences");
}

#[tokio::test]
async fn refresh_endpoint_rejects_access_tokens() {
    let config = test_config();
    let (access, _) = generate_tokens(Uuid::new_v4(), None, &config.jwt).unwrap();

    let (status, body) = send(
        app_with(config),
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refreshToken": access })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Refresh token required");
}

#[tokio::test]
async fn admin_routes_require_a_token() {
    let (status, _) = send(app(), Method::GET, "/api/v1/admin/analytics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn global_limiter_answers_429_once_the_window_is_spent() {
    let mut config = test_config();
    config.rate_limit.max_requests = 2;
    let app = app_with(config);

    for _ in 0..2 {
        let (status, _) = send(app.clone(), Method::GET, "/api/v1/users/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body) = send(app, Method::GET, "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Too many requests");
}
