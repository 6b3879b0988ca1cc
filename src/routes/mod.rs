//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket exercise runner at `/ws`
/// - JSON API under `/api/v1/...`
/// - Static frontend from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/lessons", get(http::http_list_lessons))
        .route("/api/v1/lessons/:id", get(http::http_get_lesson))
        .route("/api/v1/lessons/:id/complete", post(http::http_complete_lesson))
        .route("/api/v1/exercises/:id", get(http::http_get_exercise))
        .route("/api/v1/check", post(http::http_post_check))
        .route("/api/v1/attempts", post(http::http_post_attempt))
        .route("/api/v1/sessions", get(http::http_get_sessions))
        .route("/api/v1/progress", get(http::http_get_progress))
        .route("/api/v1/feedback", post(http::http_post_feedback))
        .route("/api/v1/tutor", post(http::http_post_tutor))
        .route("/api/v1/generate", post(http::http_post_generate))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::ContentConfig;

    fn app_with(cfg: ContentConfig) -> Router {
        build_router(Arc::new(AppState::with_config(cfg, None)))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_ai_disabled() {
        let app = app_with(ContentConfig::default());
        let (status, body) = call(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "ai": false }));
    }

    #[tokio::test]
    async fn lessons_and_exercises_are_served_without_answers() {
        let app = app_with(ContentConfig::default());
        let (_, lessons) = call(&app, "GET", "/api/v1/lessons", None).await;
        assert_eq!(lessons[0]["id"], "present-simple");

        let (status, lesson) = call(&app, "GET", "/api/v1/lessons/present-simple", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(lesson["exerciseIds"][0], "ex-present-simple");

        let (_, exercise) = call(&app, "GET", "/api/v1/exercises/ex-present-simple", None).await;
        assert_eq!(exercise["questions"].as_array().unwrap().len(), 4);
        assert!(!exercise.to_string().contains("correctIndex"));

        let (status, _) = call(&app, "GET", "/api/v1/lessons/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn check_endpoint_applies_type_rules() {
        let app = app_with(ContentConfig::default());
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/check",
            Some(json!({ "questionId": "q-ps-2", "answer": { "type": "cloze", "blanks": ["Goes "] } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isCorrect"], true);

        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/check",
            Some(json!({ "questionId": "q-ps-1", "answer": { "type": "choice" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_ANSWER");
    }

    #[tokio::test]
    async fn attempts_feed_sessions_and_progress() {
        let app = app_with(ContentConfig::default());
        for (q, ok) in [("q-ps-1", true), ("q-ps-1", false), ("q-ps-3", false)] {
            let (status, _) = call(
                &app,
                "POST",
                "/api/v1/attempts",
                Some(json!({ "userId": "u1", "questionId": q, "isCorrect": ok })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, page) = call(&app, "GET", "/api/v1/sessions?userId=u1&page=1", None).await;
        assert!(page["pagination"]["totalItems"].as_u64().unwrap() >= 1);
        let sessions = page["sessions"].as_array().unwrap();
        let score: u64 = sessions.iter().map(|s| s["score"].as_u64().unwrap()).sum();
        assert_eq!(score, 1);

        let (_, progress) = call(&app, "GET", "/api/v1/progress?userId=u1", None).await;
        assert_eq!(progress["totalAttempts"], 3);
        assert_eq!(progress["currentStreak"], 1);
    }

    #[tokio::test]
    async fn tutor_returns_429_past_the_budget() {
        let mut cfg = ContentConfig::default();
        cfg.tutor.max_requests = 2;
        let app = app_with(cfg);
        let body = json!({ "userId": "u1", "message": "When do I add -s?" });
        for _ in 0..2 {
            let (status, reply) = call(&app, "POST", "/api/v1/tutor", Some(body.clone())).await;
            assert_eq!(status, StatusCode::OK);
            assert!(reply["text"].as_str().unwrap().contains("-s"));
        }
        let (status, err) = call(&app, "POST", "/api/v1/tutor", Some(body)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err["error"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn completing_a_lesson_requires_a_user() {
        let app = app_with(ContentConfig::default());
        let uri = "/api/v1/lessons/present-simple/complete";
        let (status, err) = call(&app, "POST", uri, Some(json!({ "userId": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "BAD_REQUEST");

        let (status, body) = call(&app, "POST", uri, Some(json!({ "userId": "u1" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["newlyCompleted"], true);
    }

    #[tokio::test]
    async fn generate_without_ai_is_unavailable() {
        let app = app_with(ContentConfig::default());
        let (status, _) = call(&app, "POST", "/api/v1/generate", Some(json!({ "topic": "articles" }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
