//! Guarded view endpoints

use crate::extract::ClientContext;
use crate::{AppState, WebResult};
use axum::{
    extract::{Path, State},
    response::Json,
};
use learnex_auth::GuardOutcome;
use serde_json::Value;

/// Settle a guard outcome into a response, unregistering contexts whose session ended.
/// Store failures arrive as `Err` from the guard and never reach here.
async fn respond(
    state: &AppState,
    token: &str,
    outcome: GuardOutcome<Value>,
) -> WebResult<Json<Value>> {
    if matches!(outcome, GuardOutcome::RedirectToLogin { .. }) {
        state.sessions.remove(token).await;
    }
    Ok(Json(outcome.into_result()?))
}

/// Render a named resource for the caller, if their role allows it
pub async fn view_resource(
    State(state): State<AppState>,
    ctx: ClientContext,
    Path(resource): Path<String>,
) -> WebResult<Json<Value>> {
    let outcome = state
        .route_guard(ctx.manager.clone())
        .navigate(&resource)
        .await?;
    respond(&state, &ctx.token, outcome).await
}

/// Render the caller's home dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    ctx: ClientContext,
) -> WebResult<Json<Value>> {
    let outcome = state.route_guard(ctx.manager.clone()).navigate_home().await?;
    respond(&state, &ctx.token, outcome).await
}
