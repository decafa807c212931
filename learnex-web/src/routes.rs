//! Route definitions for the LearnEx web server

use crate::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Authentication
        .route("/auth/login", post(handlers::login))
        .route("/auth/register", post(handlers::register))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::current_user))
        .route("/auth/activity", post(handlers::activity))
        // Guarded views
        .route("/dashboard", get(handlers::dashboard))
        .route("/views/{resource}", get(handlers::view_resource))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use learnex_core::LearnexConfig;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check_route() {
        let state = AppState::new(LearnexConfig::default()).await.unwrap();
        let app = api_routes().with_state(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
