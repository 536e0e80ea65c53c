#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use journey_api::auth::jwt::{generate_access_token, JwtConfig};
use journey_api::config::{LogFormat, ServerConfig};
use journey_api::router::build_app_router;
use journey_api::service::JourneyService;
use journey_api::state::AppState;
use journey_core::catalog::{DayTemplate, Question, StageTemplate};
use journey_core::roles::Role;
use journey_core::types::DbId;
use journey_db::memory::{MemoryCatalog, MemoryJourneyStore};

pub const TEST_SECRET: &str = "test-secret-for-journey-api";

/// Stage with two days (questions 101, 102 and 102, 103), min score 80.
pub const BASICS_STAGE: DbId = 1;
/// Stage with a single day (question 201), min score 70.
pub const REVIEW_STAGE: DbId = 2;

/// Build a test `ServerConfig` with safe defaults and a known JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        log_format: LogFormat::Text,
        store_retry_attempts: 1,
        store_retry_base_delay_ms: 1,
        transition_attempts: 3,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

fn question(id: DbId, correct: &str) -> Question {
    Question {
        id,
        prompt: format!("Question {id}"),
        content: json!({ "choices": ["a", "b", "c"] }),
        correct_answer: Some(json!(correct)),
    }
}

/// The catalog every API test runs against.
pub fn test_catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_stage(StageTemplate {
            id: BASICS_STAGE,
            name: "Basics".to_string(),
            min_score: 80.0,
            target_score: 90.0,
            days: vec![
                DayTemplate {
                    day_number: 1,
                    question_ids: vec![101, 102],
                },
                DayTemplate {
                    day_number: 2,
                    question_ids: vec![102, 103],
                },
            ],
        })
        .with_stage(StageTemplate {
            id: REVIEW_STAGE,
            name: "Review".to_string(),
            min_score: 70.0,
            target_score: 85.0,
            days: vec![DayTemplate {
                day_number: 1,
                question_ids: vec![201],
            }],
        })
        .with_question(question(101, "a"))
        .with_question(question(102, "b"))
        .with_question(question(103, "c"))
        .with_question(question(201, "a"))
}

/// Build the full application router over an in-memory store.
pub fn build_test_app() -> Router {
    build_test_app_with_store(Arc::new(MemoryJourneyStore::new()))
}

/// Same as [`build_test_app`] but over a caller-held store, so tests can
/// inspect rows or switch the store off.
pub fn build_test_app_with_store(store: Arc<MemoryJourneyStore>) -> Router {
    let config = test_config();
    let catalog = Arc::new(test_catalog());
    let journeys = JourneyService::new(
        store,
        catalog.clone(),
        catalog,
        config.transition_attempts,
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        journeys: Arc::new(journeys),
    };

    build_app_router(state, &config)
}

pub fn learner_token(user_id: DbId) -> String {
    generate_access_token(user_id, Role::Learner, &test_config().jwt).unwrap()
}

pub fn admin_token(user_id: DbId) -> String {
    generate_access_token(user_id, Role::Admin, &test_config().jwt).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Read a response body as JSON (`Null` for an empty body).
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn with_json(
    app: Router,
    method: Method,
    uri: &str,
    body: Value,
    token: &str,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> (StatusCode, Value) {
    with_json(app, Method::POST, uri, body, token).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> (StatusCode, Value) {
    with_json(app, Method::PUT, uri, body, token).await
}

/// POST with an auth header and no body.
pub async fn post_auth(app: Router, uri: &str, token: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// PUT with an auth header and no body.
pub async fn put_auth(app: Router, uri: &str, token: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Create the standard two-stage journey for `token`'s user.
pub async fn create_two_stage_journey(app: &Router, token: &str) -> Value {
    let (status, body) = post_json_auth(
        app.clone(),
        "/api/v1/journeys",
        json!({ "stage_ids": [BASICS_STAGE.to_string(), REVIEW_STAGE.to_string()] }),
        token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["data"].clone()
}

/// Complete a day with an explicit score.
pub async fn complete_day(app: &Router, token: &str, stage: usize, day: i32, score: f64) -> (StatusCode, Value) {
    put_json_auth(
        app.clone(),
        &format!("/api/v1/journeys/complete-day/{stage}/{day}"),
        json!({ "score": score }),
        token,
    )
    .await
}

/// The `type` tags of a transition response's effects.
pub fn effect_types(body: &Value) -> Vec<String> {
    body["effects"]
        .as_array()
        .map(|effects| {
            effects
                .iter()
                .filter_map(|e| e["type"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Unauthenticated GET returning the raw response.
pub async fn get(app: Router, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}
