// Dev-only OTP peek endpoint. Only mounted when both
// `otp_return_to_client` and a non-production `app_env` hold
// (`AppConfig::dev_otp_enabled`); the route simply does not exist otherwise.

use axum::{extract::{Path, State}, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

pub async fn peek_otp(State(state): State<AppState>, Path(challenge_id): Path<String>) -> impl IntoResponse {
    let Some(store) = &state.dev_otp_store else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match store.get(&challenge_id) {
        Some(otp) => Json(json!({ "otp": otp })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
