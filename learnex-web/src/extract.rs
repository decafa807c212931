//! Request extractors resolving the caller's client context

use crate::{AppState, WebError};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use learnex_auth::{AuthError, SessionManager};
use tracing::debug;

/// Client context named by the `Authorization: Bearer <token>` header
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub token: String,
    pub manager: SessionManager,
}

impl<S> FromRequestParts<S> for ClientContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token = bearer_token(&parts.headers).ok_or(AuthError::NotAuthenticated)?;
        let manager = app_state.sessions.get(token).await.ok_or_else(|| {
            debug!("Unknown session token");
            AuthError::NotAuthenticated
        })?;

        Ok(Self {
            token: token.to_string(),
            manager,
        })
    }
}

/// Optional client context - doesn't fail if the caller has none
pub struct OptionalClientContext(pub Option<ClientContext>);

impl<S> FromRequestParts<S> for OptionalClientContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalClientContext(
            ClientContext::from_request_parts(parts, state).await.ok(),
        ))
    }
}

/// Token from a `Bearer` authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
