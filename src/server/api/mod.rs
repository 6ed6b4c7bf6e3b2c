//! Axum handlers for `/api/*` routes.
//!
//! Handlers receive [`AppState`] via [`axum::extract::State`] and return
//! `Result<_, ApiError>`. Store calls are short and run inline; password
//! hashing goes through [`tokio::task::spawn_blocking`].

pub(super) mod auth;
pub(super) mod carbon;
pub(super) mod chatbot;
pub(super) mod gamification;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::AppState;
use crate::error::ApiError;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Unwrap a JSON body, turning axum's rejection into our error shape.
fn body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// `Some(trimmed)` for a present, non-blank string field.
fn present(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Run CPU-heavy work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {e}")))
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /api/health
pub(super) async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": state.config.name,
        "storage": state.store.backend(),
        "llm": state.llm.as_ref().map_or("none", |l| l.name()),
    }))
}
