use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::config::AppConfig;
use crate::state::AppState;

/// Wired to the policy evaluator's self-check: compiles and evaluates the
/// reference ruleset against a minimal input. Failure signals the process
/// not-ready rather than merely "server up".
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.policy_evaluator.health_check() {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "reason": reason })),
        )
            .into_response(),
    }
}

/// Mounted instead of `health_check` when the auth core itself is disabled —
/// there is no policy evaluator to check.
pub async fn health_check_disabled(State(_config): State<AppConfig>) -> impl IntoResponse {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "degraded", "reason": "auth core disabled" })),
    )
}
