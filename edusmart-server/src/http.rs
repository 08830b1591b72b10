//! EduSmart HTTP API
//!
//! Each endpoint has a thin axum handler that delegates to an inner function;
//! the inner functions are tested directly without axum dispatch.
//!
//! Endpoints:
//! - POST /chat    : assistant reply (always 200, apology on failure)
//! - GET  /health  : liveness, no I/O
//! - GET  /test-db : transcript store / product index / model diagnostics
//! - GET  /        : static frontend from `http.frontend_dir`, when present

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use edusmart_core::{ChatReply, ChatRequest, EduSmartConfig, Language, ResponseType};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::subsystems::assistant::Assistant;
use crate::subsystems::chat::{apology_reply, handle_chat, now_rfc3339};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub assistant: Arc<Assistant>,
    pub config: EduSmartConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let cors = build_cors_layer(&state.config.http.cors_origins, state.config.http.cors_permissive);
    let frontend = state.config.http.frontend_dir.clone();

    let router = Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .route("/test-db", get(probe_handler))
        .with_state(state);

    let router = match frontend {
        Some(dir) if Path::new(&dir).is_dir() => {
            tracing::info!(dir = %dir, "Serving frontend");
            router.fallback_service(ServeDir::new(dir))
        }
        Some(dir) => {
            tracing::warn!(dir = %dir, "Frontend directory not found; static files disabled");
            router
        }
        None => router,
    };

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// Permissive unless turned off, in which case only the listed origins pass.
fn build_cors_layer(origins: &[String], permissive: bool) -> CorsLayer {
    if permissive {
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    tracing::info!("CORS configured with {} origins", parsed.len());
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    assistant: Arc<Assistant>,
    config: EduSmartConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { assistant, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("EduSmart HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner chat. A rejected body is answered like any other failure.
pub async fn chat_inner(
    assistant: &Assistant,
    payload: std::result::Result<ChatRequest, String>,
) -> ChatReply {
    match payload {
        Ok(request) => handle_chat(assistant, request).await,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected chat body");
            apology_reply(
                Uuid::new_v4().to_string(),
                ResponseType::default(),
                Language::default(),
            )
        }
    }
}

/// Inner health: pure, no I/O.
pub fn health_inner() -> serde_json::Value {
    serde_json::json!({
        "status": "healthy",
        "timestamp": now_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    })
}

/// Inner probe: read-only checks of each dependency.
pub async fn probe_inner(assistant: &Assistant) -> serde_json::Value {
    let transcript_status = assistant.transcript().status().await;

    let products = assistant.products();
    let (vector_status, count) = match products.index_name() {
        None => ("error: product index not configured".to_string(), 0),
        Some(_) => match products.count().await {
            Ok(n) => ("connected".to_string(), n),
            Err(e) => (format!("error: {e}"), 0),
        },
    };

    serde_json::json!({
        "transcript_store_status": transcript_status,
        "vector_store_status": vector_status,
        "vector_products_count": count,
        "model_configured": assistant.model_name().is_some(),
        "model_client": assistant.model_name(),
        "timestamp": now_rfc3339(),
    })
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> impl IntoResponse {
    let payload = payload.map(|Json(req)| req).map_err(|e| e.body_text());
    (StatusCode::OK, Json(chat_inner(&state.assistant, payload).await))
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner()))
}

pub async fn probe_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(probe_inner(&state.assistant).await))
}
