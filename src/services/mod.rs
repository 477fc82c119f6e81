pub mod audit_service;
pub mod auth_service;
pub mod otp;
pub mod password_hasher;
pub mod policy_evaluator;
pub mod refresh_digest;
pub mod telemetry;
pub mod token_signer;
