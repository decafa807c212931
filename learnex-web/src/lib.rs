//! LearnEx Web Server
//!
//! JSON API over the LearnEx session lifecycle: login, registration, activity,
//! logout and role-guarded views. Each login gets its own client context in a
//! [`SessionRegistry`], addressed by the session token.

pub mod extract;
pub mod handlers;
pub mod registry;
pub mod routes;
pub mod server;
pub mod state;
pub mod views;

// Re-export main types
pub use registry::SessionRegistry;
pub use server::{LearnexServer, LearnexServerBuilder};
pub use state::AppState;
pub use views::DashboardViews;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Router,
};
use learnex_auth::AuthError;
use learnex_core::{LearnexConfig, LearnexError};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Path clients are sent to when they need to (re)authenticate
pub const LOGIN_PATH: &str = "/login";

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Apply `LEARNEX_*` environment overrides on top of a loaded configuration
pub fn apply_env_overrides(config: &mut LearnexConfig) {
    if let Ok(host) = std::env::var("LEARNEX_HOST") {
        config.server.host = host;
    }
    if let Some(port) = std::env::var("LEARNEX_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
    {
        config.server.port = port;
    }
    if let Some(dev_mode) = std::env::var("LEARNEX_DEV_MODE")
        .ok()
        .and_then(|d| d.parse().ok())
    {
        config.server.dev_mode = dev_mode;
    }
    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        config.storage.database_url = Some(database_url);
    }
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] LearnexError),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

impl WebError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            WebError::Auth(auth) => match auth {
                AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
                AuthError::MissingCredentials => (StatusCode::BAD_REQUEST, "missing_credentials"),
                AuthError::WeakPassword { .. } => (StatusCode::BAD_REQUEST, "weak_password"),
                AuthError::IdentifierTaken { .. } => (StatusCode::CONFLICT, "identifier_taken"),
                AuthError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated"),
                AuthError::SessionExpired => (StatusCode::UNAUTHORIZED, "session_expired"),
                AuthError::AccessDenied { .. } => (StatusCode::FORBIDDEN, "access_denied"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
            WebError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            WebError::Server(_) | WebError::Config(_) | WebError::Core(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();

        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "error": error_code,
            "message": message,
        });
        if status == StatusCode::UNAUTHORIZED && error_code != "invalid_credentials" {
            body["redirect"] = json!(LOGIN_PATH);
        }

        (status, Json(body)).into_response()
    }
}
