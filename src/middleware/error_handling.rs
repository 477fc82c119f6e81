// ============================================================================
// Error Handling — Production-Ready Error Responses
// ============================================================================
//
// SECURITY: internal errors (database, JWT, hashing) are logged server-side
// only; clients receive a generic message. Never leak stack traces, schema
// details, or file paths in a response body.
// ============================================================================

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("invalid request body: {0}")]
    Json(#[from] JsonRejection),

    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    // ---- Stable domain taxonomy, mapped to HTTP status below ----
    #[error("email already registered")]
    EmailAlreadyRegistered,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("refresh token reuse detected")]
    RefreshTokenReuse,

    #[error("not a member of this organization")]
    NotOrgMember,

    #[error("phone required for mfa")]
    PhoneRequiredForMfa,

    #[error("invalid mfa challenge")]
    InvalidMfaChallenge,

    #[error("invalid otp")]
    InvalidOtp,

    #[error("invalid mfa intent")]
    InvalidMfaIntent,

    #[error("mfa challenge expired")]
    ChallengeExpired,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("auth core is not enabled")]
    Unimplemented,

    #[error("unauthenticated")]
    Unauthenticated,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref err) => {
                tracing::error!(error = ?err, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation failed".to_string()),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "invalid request body".to_string()),
            AppError::Jwt(ref err) => {
                tracing::warn!(error = ?err, "jwt validation failed");
                (StatusCode::UNAUTHORIZED, "invalid token".to_string())
            }
            AppError::PasswordHash(ref err) => {
                tracing::error!(error = ?err, "password hashing failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            AppError::Internal(ref err) => {
                tracing::error!(error = ?err, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            AppError::EmailAlreadyRegistered => (StatusCode::CONFLICT, "email already registered".to_string()),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid credentials".to_string()),
            AppError::InvalidRefreshToken => (StatusCode::UNAUTHORIZED, "invalid refresh token".to_string()),
            AppError::RefreshTokenReuse => (StatusCode::UNAUTHORIZED, "refresh token reuse detected".to_string()),
            AppError::NotOrgMember => (StatusCode::FORBIDDEN, "not a member of this organization".to_string()),
            AppError::PhoneRequiredForMfa => (StatusCode::PRECONDITION_FAILED, "phone required for mfa".to_string()),
            AppError::InvalidMfaChallenge => (StatusCode::UNAUTHORIZED, "invalid mfa challenge".to_string()),
            AppError::InvalidOtp => (StatusCode::UNAUTHORIZED, "invalid otp".to_string()),
            AppError::InvalidMfaIntent => (StatusCode::UNAUTHORIZED, "invalid mfa intent".to_string()),
            AppError::ChallengeExpired => (StatusCode::PRECONDITION_FAILED, "mfa challenge expired".to_string()),
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unimplemented => (StatusCode::NOT_IMPLEMENTED, "auth core is not enabled".to_string()),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated".to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
