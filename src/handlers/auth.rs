use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Extension, State},
    http::HeaderMap,
    Json,
};
use validator::Validate;

use crate::middleware::auth_interceptor::IdentityContext;
use crate::middleware::error_handling::{AppError, Result};
use crate::middleware::ip_extraction::extract_client_ip;
use crate::models::dto::{
    AuthResult, LoginRequest, LogoutRequest, LogoutResponse, RefreshRequest, RegisterRequest,
    RegisterResponse, SubmitPhoneRequest, VerifyCredentialsRequest, VerifyCredentialsResponse,
    VerifyMfaRequest,
};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    request.validate().map_err(AppError::Validation)?;

    let user_id = state
        .auth_service
        .register(&request.email, &request.password, request.name.as_deref())
        .await?;

    Ok(Json(RegisterResponse { user_id }))
}

pub async fn verify_credentials(
    State(state): State<AppState>,
    Json(request): Json<VerifyCredentialsRequest>,
) -> Result<Json<VerifyCredentialsResponse>> {
    request.validate().map_err(AppError::Validation)?;

    let user_id = state
        .auth_service
        .verify_credentials(&request.email, &request.password)
        .await?;

    Ok(Json(VerifyCredentialsResponse { user_id }))
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResult>> {
    request.validate().map_err(AppError::Validation)?;

    let client_ip = extract_client_ip(&headers, Some(addr));

    let result = state
        .auth_service
        .login(
            &request.email,
            &request.password,
            &request.org_id,
            request.device_fingerprint.as_deref(),
            &client_ip,
        )
        .await?;

    Ok(Json(result))
}

pub async fn submit_phone_and_request_mfa(
    State(state): State<AppState>,
    Json(request): Json<SubmitPhoneRequest>,
) -> Result<Json<AuthResult>> {
    let result = state
        .auth_service
        .submit_phone_and_request_mfa(&request.intent_id, &request.phone)
        .await?;

    Ok(Json(result))
}

pub async fn verify_mfa(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<VerifyMfaRequest>,
) -> Result<Json<AuthResult>> {
    let client_ip = extract_client_ip(&headers, Some(addr));

    let result = state
        .auth_service
        .verify_mfa(&request.challenge_id, &request.otp, &client_ip)
        .await?;

    Ok(Json(result))
}

pub async fn refresh(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AuthResult>> {
    let client_ip = extract_client_ip(&headers, Some(addr));

    let result = state
        .auth_service
        .refresh(
            &request.refresh_token,
            request.device_fingerprint.as_deref(),
            &client_ip,
        )
        .await?;

    Ok(Json(result))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>> {
    let client_ip = extract_client_ip(&headers, Some(addr));

    state
        .auth_service
        .logout(
            request.refresh_token.as_deref(),
            Some(&identity.session_id),
            &client_ip,
        )
        .await?;

    Ok(Json(LogoutResponse {}))
}
