// Shared application state handed to every handler and to the authorization
// interceptor via axum's `State` extractor.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::repositories::traits::{AuditRepository, DevOtpStore, SessionRepository};
use crate::services::auth_service::AuthService;
use crate::services::policy_evaluator::PolicyEvaluator;
use crate::services::telemetry::Telemetry;
use crate::services::token_signer::TokenSigner;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub token_signer: TokenSigner,
    pub sessions: Arc<dyn SessionRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub telemetry: Telemetry,
    pub policy_evaluator: Arc<PolicyEvaluator>,
    pub dev_otp_store: Option<Arc<dyn DevOtpStore>>,
    pub config: AppConfig,
}
