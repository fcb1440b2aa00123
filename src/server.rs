//! HTTP surface: the chat endpoint, the health check, and static assets.
//!
//! All pipeline failures are absorbed here and mapped to JSON responses;
//! nothing escapes to crash the process, and internal error detail is
//! logged but never echoed to the caller.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::completion::CompletionClient;
use crate::pipeline::{ChatError, ChatRequest, MentorPipeline};
use crate::store::SummaryStore;

/// User-facing message for a request missing email or message.
pub const MSG_BAD_REQUEST: &str = "email et message sont requis.";
/// User-facing message when the upstream throttles us.
pub const MSG_RATE_LIMITED: &str =
    "Le mentor est très sollicité en ce moment. Réessaie dans quelques instants.";
/// User-facing message for any other technical failure.
pub const MSG_TECHNICAL_FAILURE: &str =
    "Désolé, un problème technique est survenu. Réessaie dans un instant.";

/// Shared per-process state handed to every handler.
pub struct AppState {
    /// The chat pipeline.
    pub pipeline: MentorPipeline,
    /// Store handle for the health probe.
    pub store: SummaryStore,
    /// Completion client handle for the health probe.
    pub client: Arc<dyn CompletionClient>,
}

/// `POST /api/chat` request body.
///
/// Fields are optional at the wire level so a missing field answers 400
/// with the designated message instead of a framework rejection.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    /// Student identifier.
    #[serde(default)]
    pub email: Option<String>,
    /// The student's message.
    #[serde(default)]
    pub message: Option<String>,
    /// Optional program identifier.
    #[serde(default, rename = "programId")]
    pub program_id: Option<String>,
}

/// `POST /api/chat` response body — every outcome carries a `reply`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    /// Mentor reply or user-facing error message.
    pub reply: String,
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/health", get(health))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn chat(State(state): State<Arc<AppState>>, Json(body): Json<ChatBody>) -> Response {
    let (Some(email), Some(message)) = (body.email, body.message) else {
        return reply_with(StatusCode::BAD_REQUEST, MSG_BAD_REQUEST);
    };

    let request = ChatRequest {
        email,
        message,
        program_id: body.program_id,
    };

    match state.pipeline.handle_chat(request).await {
        Ok(reply) => (StatusCode::OK, Json(ChatReply { reply })).into_response(),
        Err(ChatError::BadRequest) => reply_with(StatusCode::BAD_REQUEST, MSG_BAD_REQUEST),
        Err(ChatError::RateLimited) => {
            warn!("chat rejected: completion service rate limited");
            reply_with(StatusCode::SERVICE_UNAVAILABLE, MSG_RATE_LIMITED)
        }
        Err(ChatError::Configuration(detail)) => {
            error!(detail, "chat failed: prompt misconfiguration");
            reply_with(StatusCode::INTERNAL_SERVER_ERROR, MSG_TECHNICAL_FAILURE)
        }
        Err(ChatError::Completion(err)) => {
            error!(error = %err, "chat failed: completion error");
            reply_with(StatusCode::INTERNAL_SERVER_ERROR, MSG_TECHNICAL_FAILURE)
        }
    }
}

fn reply_with(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ChatReply {
            reply: message.to_owned(),
        }),
    )
        .into_response()
}

/// `GET /api/health` — `200 true` when the completion client is ready and
/// the storage backend answers, `503 false` otherwise.
async fn health(State(state): State<Arc<AppState>>) -> Response {
    if !state.client.ready() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(false)).into_response();
    }
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(true)).into_response(),
        Err(err) => {
            warn!(error = %err, "health check: storage unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, Json(false)).into_response()
        }
    }
}

/// Bind and serve until ctrl-c.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, bind: &str, static_dir: &str) -> anyhow::Result<()> {
    let app = build_router(state, static_dir);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {bind}: {e}"))?;
    info!(%bind, "mentord listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    info!("mentord shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install ctrl-c handler");
    }
}
