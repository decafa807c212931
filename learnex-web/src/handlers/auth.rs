//! Authentication handlers: login, registration, logout, activity and the current user

use crate::extract::{ClientContext, OptionalClientContext};
use crate::{AppState, WebError, WebResult};
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use learnex_auth::{AuthError, Principal, RegisterRequest, Role, Session, SessionConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    #[serde(alias = "username", alias = "email")]
    pub identifier: String,
    pub password: String,
}

/// Successful login or registration
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Principal,
    pub issued_at: DateTime<Utc>,
    /// Seconds until the idle timeout elapses without further activity
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(session: Session, config: &SessionConfig) -> Self {
        Self {
            expires_in: config.idle_timeout.num_seconds(),
            token: session.token,
            user: session.user,
            issued_at: session.issued_at,
        }
    }
}

/// Create a client context and authenticate it, registering it on success
async fn start_session(
    state: &AppState,
    identifier: &str,
    password: &str,
) -> WebResult<AuthResponse> {
    let slot = state.sessions.new_context()?;

    match slot.manager.authenticate(identifier, password).await {
        Ok(session) => {
            state.sessions.insert(session.token.clone(), slot).await;
            Ok(AuthResponse::new(session, state.sessions.session_config()))
        }
        Err(e) => {
            state.sessions.discard(slot).await;
            Err(e.into())
        }
    }
}

/// Unregister the context when `err` means its session is gone
async fn forget_if_ended(state: &AppState, token: &str, err: &AuthError) {
    if matches!(err, AuthError::SessionExpired | AuthError::NotAuthenticated) {
        state.sessions.remove(token).await;
    }
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> WebResult<Json<AuthResponse>> {
    info!("Login attempt: {}", request.identifier);

    let response = start_session(&state, &request.identifier, &request.password).await?;

    info!("User logged in: {}", response.user.identifier);
    Ok(Json(response))
}

/// User registration endpoint
///
/// Anyone may create a student or parent account. Teacher and admin accounts
/// can only be created by a signed-in administrator. The new account is
/// signed in straight away.
pub async fn register(
    State(state): State<AppState>,
    OptionalClientContext(caller): OptionalClientContext,
    Json(request): Json<RegisterRequest>,
) -> WebResult<(StatusCode, Json<AuthResponse>)> {
    info!("Registration attempt: {}", request.username);

    let role = request.role.unwrap_or_default();
    if !role.is_self_registrable() {
        let caller_is_admin = match &caller {
            Some(ctx) => ctx
                .manager
                .current_user()
                .await
                .is_some_and(|principal| principal.role == Role::Admin),
            None => false,
        };

        if !caller_is_admin {
            warn!("Rejected self-registration as {}", role);
            return Err(WebError::Forbidden(format!(
                "Only an administrator can create {} accounts",
                role
            )));
        }
    }

    let password = request.password.clone();
    let record = state.credentials.register(request).await?;
    let response = start_session(&state, &record.username, &password).await?;

    info!("User registered: {} ({})", record.username, record.role);
    Ok((StatusCode::CREATED, Json(response)))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    ctx: ClientContext,
) -> WebResult<Json<Value>> {
    let user = ctx.manager.snapshot().await.map(|session| session.user.identifier);

    ctx.manager.logout().await?;
    state.sessions.remove(&ctx.token).await;

    info!("User logout: {}", user.as_deref().unwrap_or("<expired>"));
    Ok(Json(json!({
        "message": "Logged out successfully",
    })))
}

/// Current user and session timestamps
pub async fn current_user(
    State(state): State<AppState>,
    ctx: ClientContext,
) -> WebResult<Json<Value>> {
    match ctx.manager.require_session().await {
        Ok(session) => Ok(Json(json!({
            "user": session.user,
            "issued_at": session.issued_at,
            "last_activity_at": session.last_activity_at,
            "expires_at": session.expires_at(ctx.manager.config()),
        }))),
        Err(e) => {
            forget_if_ended(&state, &ctx.token, &e).await;
            Err(e.into())
        }
    }
}

/// Record client activity (keeps the idle timeout from elapsing)
pub async fn activity(
    State(state): State<AppState>,
    ctx: ClientContext,
) -> WebResult<StatusCode> {
    if ctx.manager.touch().await {
        return Ok(StatusCode::NO_CONTENT);
    }

    // The cached session is gone or timed out; let validation settle which
    let err = match ctx.manager.require_session().await {
        Ok(_) => return Ok(StatusCode::NO_CONTENT),
        Err(e) => e,
    };
    forget_if_ended(&state, &ctx.token, &err).await;
    Err(err.into())
}
