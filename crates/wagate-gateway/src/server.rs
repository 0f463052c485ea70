// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router assembly and the HTTP server.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use wagate_config::WagateConfig;
use wagate_core::WagateError;
use wagate_session::SessionManager;
use wagate_storage::Database;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers::{self, messages, sessions, templates, webhooks};
use crate::request_id::request_id_middleware;

/// Uploads beyond this size are rejected before they reach a handler.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub manager: Arc<SessionManager>,
    pub config: Arc<WagateConfig>,
}

/// Assemble the full route tree: `/health` public, everything else under
/// `/api` behind the API key.
pub fn build_router(state: AppState) -> Router {
    let auth = AuthConfig {
        api_key: state.config.server.api_key.clone(),
    };

    let api = Router::new()
        .route("/sessions/start", post(sessions::start_session))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/{id}/status", get(sessions::session_status))
        .route("/sessions/{id}/qr", get(sessions::session_qr))
        .route("/sessions/{id}/stop", post(sessions::stop_session))
        .route("/sessions/{id}/logout", post(sessions::logout_session))
        .route("/sessions/{id}/message/send/text", post(messages::send_text))
        .route("/sessions/{id}/message/send/media", post(messages::send_media))
        .route(
            "/sessions/{id}/message/send/template",
            post(messages::send_template),
        )
        .route("/sessions/{id}/message/send/file", post(messages::send_file))
        .route("/sessions/{id}/messages/log", get(messages::message_log))
        .route(
            "/templates",
            post(templates::create_template).get(templates::list_templates),
        )
        .route(
            "/templates/{name}",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route("/webhooks/failed", get(webhooks::failed_deliveries))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the token is cancelled.
pub async fn start_server(state: AppState, shutdown: CancellationToken) -> Result<(), WagateError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WagateError::Internal(format!("failed to bind {addr}: {e}")))?;
    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| WagateError::Internal(format!("server error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tower::ServiceExt;

    use wagate_storage::queries::queue;
    use wagate_storage::OUTBOUND_QUEUE;
    use wagate_transport::loopback::LoopbackTransport;
    use wagate_webhook::WebhookDispatcher;

    const API_KEY: &str = "test-key";

    async fn test_state(api_key: Option<&str>) -> (AppState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mut config = WagateConfig::default();
        config.server.api_key = api_key.map(str::to_string);
        config.storage.upload_dir = dir.path().join("uploads").to_string_lossy().into_owned();

        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let dispatcher = WebhookDispatcher::new(db.clone(), &config.webhook_queue);
        let manager = SessionManager::new(
            db.clone(),
            Arc::new(LoopbackTransport::new()),
            dispatcher,
            config.session.clone(),
            dir.path().join("auth"),
        );
        let state = AppState {
            db,
            manager,
            config: Arc::new(config),
        };
        (state, dir)
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-api-key", API_KEY);
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (state, _dir) = test_state(Some(API_KEY)).await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn api_rejects_missing_or_wrong_key() {
        let (state, _dir) = test_state(Some(API_KEY)).await;
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(Request::get("/api/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert!(body["requestId"].is_string());

        let response = app
            .oneshot(
                Request::get("/api/sessions")
                    .header("x-api-key", "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn api_is_fail_closed_without_configured_key() {
        let (state, _dir) = test_state(None).await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::get("/api/sessions")
                    .header("x-api-key", "anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_lifecycle_over_http() {
        let (state, _dir) = test_state(Some(API_KEY)).await;
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/sessions/start",
                Some(json!({ "sessionId": "s1" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // Loopback pairing completes almost immediately.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/sessions/s1/status", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "CONNECTED");
        assert_eq!(body["identity"], "s1@loopback");

        // QR endpoint short-circuits once connected.
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/sessions/s1/qr", None))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert!(body.get("qr").is_none());
        assert_eq!(body["status"], "CONNECTED");

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/sessions/s1/stop", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, "/api/sessions/s1/status", None))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "STOPPED");

        state.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_session_status_is_404_with_error_envelope() {
        let (state, _dir) = test_state(Some(API_KEY)).await;
        let app = build_router(state);

        let response = app
            .oneshot(request(Method::GET, "/api/sessions/ghost/status", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["status"], 404);
        assert_eq!(body["code"], "NOT_FOUND");
        assert!(body["requestId"].is_string());
    }

    #[tokio::test]
    async fn send_text_enqueues_for_connected_session() {
        let (state, _dir) = test_state(Some(API_KEY)).await;
        let app = build_router(state.clone());

        app.clone()
            .oneshot(request(
                Method::POST,
                "/api/sessions/start",
                Some(json!({ "sessionId": "s1" })),
            ))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/sessions/s1/message/send/text",
                Some(json!({ "to": "123@c.us", "message": "hi" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert!(body["jobId"].is_number());

        let entry = queue::dequeue_due(&state.db, OUTBOUND_QUEUE)
            .await
            .unwrap()
            .unwrap();
        assert!(entry.payload.contains(r#""type":"text""#));

        // The log is scoped to the session in the path; nothing delivered yet.
        let response = app
            .oneshot(request(Method::GET, "/api/sessions/s1/messages/log", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));

        state.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn send_to_unknown_session_is_404() {
        let (state, _dir) = test_state(Some(API_KEY)).await;
        let app = build_router(state);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/sessions/ghost/message/send/text",
                Some(json!({ "to": "123@c.us", "message": "hi" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn template_crud_roundtrip() {
        let (state, _dir) = test_state(Some(API_KEY)).await;
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/templates",
                Some(json!({ "name": "welcome", "content": "Hi {{name}}" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // Duplicate name is rejected.
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/templates",
                Some(json!({ "name": "welcome", "content": "again" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(request(
                Method::PUT,
                "/api/templates/welcome",
                Some(json!({ "content": "Hello {{name}}" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["content"], "Hello {{name}}");

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, "/api/templates/welcome", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, "/api/templates/welcome", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        state.db.close().await.unwrap();
    }
}
