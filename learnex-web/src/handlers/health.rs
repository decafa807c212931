//! Liveness endpoint

use crate::AppState;
use axum::{extract::State, response::Json};
use serde_json::{json, Value};

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.sessions.len().await,
    }))
}
