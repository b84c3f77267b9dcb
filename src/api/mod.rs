pub mod error;
pub mod response;
pub mod routes;

use crate::storage::Storage;
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router as AxumRouter};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub use error::ApiError;
pub use response::*;
pub use routes::AppState;

/// HTTP server for the chat API
pub struct ApiServer<S: Storage> {
    state: Arc<AppState<S>>,
    host: String,
    port: u16,
    cors: bool,
}

impl<S: Storage + 'static> ApiServer<S> {
    pub fn new(state: Arc<AppState<S>>, host: String, port: u16) -> Self {
        Self {
            state,
            host,
            port,
            cors: true,
        }
    }

    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }

    /// Start the server
    pub async fn start(&self) -> Result<()> {
        let app = build_routes(self.state.clone(), self.cors);
        let addr = format!("{}:{}", self.host, self.port);

        info!("Starting chat API on {} (Health: /health, API: /api)", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .context("Failed to bind server")?;

        axum::serve(listener, app).await.context("Server error")?;

        Ok(())
    }
}

/// Build Axum router with all endpoints
pub fn build_routes<S: Storage + 'static>(state: Arc<AppState<S>>, cors: bool) -> AxumRouter {
    let api_routes = AxumRouter::new()
        .route("/api/chat", post(routes::chat::<S>))
        .route(
            "/api/chat_history",
            get(routes::all_history::<S>).post(routes::append_history::<S>),
        )
        .route(
            "/api/chat_history/reset",
            post(routes::reset_history::<S>),
        )
        .route(
            "/api/chat_history/:conversation_id",
            get(routes::conversation_history::<S>),
        )
        .route(
            "/api/conversations",
            get(routes::list_conversations::<S>).post(routes::create_conversation::<S>),
        )
        .route(
            "/api/conversations/:id",
            delete(routes::delete_conversation::<S>),
        )
        .route("/api/silver_analysis", get(routes::silver_analysis::<S>))
        .with_state(state);

    let router = AxumRouter::new()
        .route("/health", get(health_handler))
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 10)) // 10MB, images arrive inline
        .layer(axum::middleware::from_fn(logging_middleware));

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Health check handler
async fn health_handler() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            service: "chatrelay".to_string(),
        }),
    )
}

/// Logging middleware
async fn logging_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();
    tracing::info!("{} {} -> {}", method, uri, status);

    response
}
