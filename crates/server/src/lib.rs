//! HTTP server for the Docent chat API.
//!
//! Endpoints:
//!
//! - `POST /api/chat`          — Send a conversation, stream the reply
//! - `POST /api/chat/request`  — Send a conversation, get the full reply
//! - `GET  /health`            — Liveness probe
//! - `GET  /data/{file}`       — Source documents referenced by citations
//! - `GET  /`                  — Redirect to `/health`

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::response::{Json, Redirect};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use docent_config::AppConfig;
use docent_core::GenerationEngine;

pub mod chat;
pub mod state;
pub mod stream;

pub use chat::ChatResult;
pub use state::{AppState, ErrorResponse, SharedState};

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: SharedState) -> Router {
    // The chat frontend runs on its own origin during development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat::chat_handler))
        .route("/api/chat/request", post(chat::chat_request_handler))
        .nest_service("/data", ServeDir::new(&state.data_dir))
        .layer(DefaultBodyLimit::max(4 * 1024 * 1024)) // 4 MB: file content rides in annotations
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> Redirect {
    Redirect::temporary("/health")
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Start the HTTP server and serve until the process is stopped.
pub async fn start(
    config: &AppConfig,
    engine: Arc<dyn GenerationEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(engine, config));
    let app = build_router(state);

    let addr = config.bind_addr();
    info!(addr = %addr, "Docent server starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::path::PathBuf;
    use tower::ServiceExt;

    use docent_core::{ChatMessage, ChatResponse, EngineError, StreamingChatResponse};

    struct StubEngine;

    #[async_trait]
    impl GenerationEngine for StubEngine {
        async fn stream_chat(
            &self,
            _message: String,
            _history: Vec<ChatMessage>,
            _document_ids: Vec<String>,
        ) -> Result<StreamingChatResponse, EngineError> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(StreamingChatResponse {
                tokens: rx,
                source_nodes: Vec::new(),
            })
        }

        async fn chat(
            &self,
            _message: String,
            _history: Vec<ChatMessage>,
            _document_ids: Vec<String>,
        ) -> Result<ChatResponse, EngineError> {
            Ok(ChatResponse {
                content: String::new(),
                source_nodes: Vec::new(),
            })
        }
    }

    fn test_router(data_dir: PathBuf) -> Router {
        build_router(Arc::new(AppState {
            engine: Arc::new(StubEngine),
            data_dir,
            url_prefix: None,
        }))
    }

    #[tokio::test]
    async fn health_reports_version() {
        let app = test_router(PathBuf::from("/data"));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let resp: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp["status"], "ok");
        assert_eq!(resp["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn root_redirects_to_health() {
        let app = test_router(PathBuf::from("/data"));

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()["location"], "/health");
    }

    #[tokio::test]
    async fn data_route_serves_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello from disk").unwrap();
        let app = test_router(dir.path().to_path_buf());

        let req = Request::builder()
            .uri("/data/notes.txt")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello from disk");
    }

    #[tokio::test]
    async fn unknown_data_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path().to_path_buf());

        let req = Request::builder()
            .uri("/data/missing.txt")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
