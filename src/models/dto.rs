use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyCredentialsRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyCredentialsResponse {
    pub user_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    pub org_id: String,
    pub device_fingerprint: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitPhoneRequest {
    pub intent_id: String,
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitPhoneResponse {
    pub challenge_id: String,
    pub phone_mask: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyMfaRequest {
    pub challenge_id: String,
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub device_fingerprint: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {}

/// Tagged union, never represented as a bag of optional fields.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthResult {
    Tokens {
        access_token: String,
        refresh_token: String,
        expires_at: chrono::DateTime<chrono::Utc>,
        user_id: String,
        org_id: String,
    },
    MfaRequired {
        challenge_id: String,
        phone_mask: String,
    },
    PhoneRequired {
        intent_id: String,
    },
}
