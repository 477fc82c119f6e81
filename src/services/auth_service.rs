// The authentication core. Orchestrates Register, VerifyCredentials, Login,
// SubmitPhoneAndRequestMFA, VerifyMFA, Refresh, Logout. Only this service
// mutates session rows and device trust state. No cross-call state is kept
// in memory beyond configuration and the injected collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::dto::AuthResult;
use crate::models::organization::SENTINEL_ORG_ID;
use crate::models::user::LOCAL_PROVIDER;
use crate::repositories::traits::{
    AuditRepository, DeviceRepository, DevOtpStore, IdentityRepository, MembershipRepository,
    MfaChallengeRepository, MfaIntentRepository, OrgMfaSettingsRepository,
    OrgPolicyRuleRepository, OtpSender, PlatformSettingsRepository, SessionRepository,
    UserRepository,
};
use crate::services::audit_service::AuditService;
use crate::services::otp::{generate_otp, hash_otp, otp_equal};
use crate::services::password_hasher::{validate_password_complexity, PasswordHasher};
use crate::services::policy_evaluator::{PolicyEvaluator, PolicyInput};
use crate::services::refresh_digest::{hash_refresh_token, refresh_token_hash_equal};
use crate::services::telemetry::Telemetry;
use crate::services::token_signer::{TokenSigner, TokenType};
use crate::utils::phone_mask::mask_phone;

pub struct AuthServiceDeps {
    pub users: Arc<dyn UserRepository>,
    pub identities: Arc<dyn IdentityRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub devices: Arc<dyn DeviceRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub platform_settings: Arc<dyn PlatformSettingsRepository>,
    pub org_mfa_settings: Arc<dyn OrgMfaSettingsRepository>,
    pub org_policy_rules: Arc<dyn OrgPolicyRuleRepository>,
    pub mfa_challenges: Arc<dyn MfaChallengeRepository>,
    pub mfa_intents: Arc<dyn MfaIntentRepository>,
    pub otp_sender: Arc<dyn OtpSender>,
    pub dev_otp_store: Option<Arc<dyn DevOtpStore>>,
    pub audit: Arc<dyn AuditRepository>,
    pub telemetry: Telemetry,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    identities: Arc<dyn IdentityRepository>,
    sessions: Arc<dyn SessionRepository>,
    devices: Arc<dyn DeviceRepository>,
    memberships: Arc<dyn MembershipRepository>,
    platform_settings: Arc<dyn PlatformSettingsRepository>,
    org_mfa_settings: Arc<dyn OrgMfaSettingsRepository>,
    org_policy_rules: Arc<dyn OrgPolicyRuleRepository>,
    mfa_challenges: Arc<dyn MfaChallengeRepository>,
    mfa_intents: Arc<dyn MfaIntentRepository>,
    otp_sender: Arc<dyn OtpSender>,
    dev_otp_store: Option<Arc<dyn DevOtpStore>>,
    audit: AuditService,
    telemetry: Telemetry,
    password_hasher: PasswordHasher,
    token_signer: TokenSigner,
    policy: PolicyEvaluator,
    mfa_challenge_ttl: Duration,
}

impl AuthService {
    pub fn new(
        deps: AuthServiceDeps,
        password_hasher: PasswordHasher,
        token_signer: TokenSigner,
        mfa_challenge_ttl: Duration,
    ) -> Self {
        Self {
            users: deps.users,
            identities: deps.identities,
            sessions: deps.sessions,
            devices: deps.devices,
            memberships: deps.memberships,
            platform_settings: deps.platform_settings,
            org_mfa_settings: deps.org_mfa_settings,
            org_policy_rules: deps.org_policy_rules,
            mfa_challenges: deps.mfa_challenges,
            mfa_intents: deps.mfa_intents,
            otp_sender: deps.otp_sender,
            dev_otp_store: deps.dev_otp_store,
            audit: AuditService::new(deps.audit),
            telemetry: deps.telemetry,
            password_hasher,
            token_signer,
            policy: PolicyEvaluator::new(),
            mfa_challenge_ttl,
        }
    }

    fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    // ---- Register ----

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<String> {
        let email = Self::normalize_email(email);
        validate_password_complexity(password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::EmailAlreadyRegistered);
        }

        let user = self.users.create(&email, name).await?;
        let password_hash = self.password_hasher.hash(password)?;
        self.identities
            .create(&user.id, LOCAL_PROVIDER, &email, &password_hash)
            .await?;

        Ok(user.id)
    }

    // ---- VerifyCredentials ----

    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<String> {
        let email = Self::normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .filter(|u| u.is_active())
            .ok_or(AppError::InvalidCredentials)?;

        let identity = self
            .identities
            .find_by_user_and_provider(&user.id, LOCAL_PROVIDER)
            .await?
            .filter(|i| !i.password_hash.is_empty())
            .ok_or(AppError::InvalidCredentials)?;

        if !self.password_hasher.verify(password, &identity.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        Ok(user.id)
    }

    // ---- Login ----

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        org_id: &str,
        device_fingerprint: Option<&str>,
        client_ip: &str,
    ) -> Result<AuthResult> {
        if email.trim().is_empty() || password.is_empty() || org_id.trim().is_empty() {
            return Err(AppError::InvalidCredentials);
        }

        let email = Self::normalize_email(email);
        let fingerprint = device_fingerprint
            .filter(|f| !f.is_empty())
            .unwrap_or(crate::models::device::DEFAULT_DEVICE_FINGERPRINT);

        let user = match self.users.find_by_email(&email).await? {
            Some(u) if u.is_active() => u,
            Some(_) | None => {
                self.audit
                    .emit(SENTINEL_ORG_ID, "", "login_failure", "auth", client_ip, None)
                    .await;
                self.telemetry.emit("login_failure", serde_json::json!({"org_id": org_id}));
                return Err(AppError::InvalidCredentials);
            }
        };

        let identity = match self
            .identities
            .find_by_user_and_provider(&user.id, LOCAL_PROVIDER)
            .await?
        {
            Some(i) if !i.password_hash.is_empty() => i,
            _ => {
                self.audit
                    .emit(SENTINEL_ORG_ID, &user.id, "login_failure", "auth", client_ip, None)
                    .await;
                self.telemetry
                    .emit("login_failure", serde_json::json!({"org_id": org_id, "user_id": user.id}));
                return Err(AppError::InvalidCredentials);
            }
        };

        if !self.password_hasher.verify(password, &identity.password_hash)? {
            self.audit
                .emit(SENTINEL_ORG_ID, &user.id, "login_failure", "auth", client_ip, None)
                .await;
            self.telemetry
                .emit("login_failure", serde_json::json!({"org_id": org_id, "user_id": user.id}));
            return Err(AppError::InvalidCredentials);
        }

        if self
            .memberships
            .find_by_user_and_org(&user.id, org_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotOrgMember);
        }

        let (device, is_new_device) = match self.devices.find_by_triple(&user.id, org_id, fingerprint).await? {
            Some(device) => (device, false),
            None => (self.devices.create(&user.id, org_id, fingerprint).await?, true),
        };

        let platform = self.platform_settings.get().await.unwrap_or_default();
        let org_settings = self
            .org_mfa_settings
            .get_by_org(org_id)
            .await
            .unwrap_or(None)
            .unwrap_or_else(|| crate::models::settings::OrgMfaSettings::defaults_for(org_id));

        let now = Utc::now();
        let policy_input = PolicyInput::from_settings(
            &platform,
            &org_settings,
            is_new_device,
            device.is_effectively_trusted(now),
            user.has_phone(),
        );
        let org_rules = self
            .org_policy_rules
            .list_enabled_by_org(org_id)
            .await
            .unwrap_or_default();
        let policy = self.policy.evaluate(&policy_input, &org_rules);

        if !policy.mfa_required {
            let result = self
                .create_session_and_issue_tokens(&user.id, org_id, &device.id, Some(client_ip))
                .await?;
            self.audit
                .emit(org_id, &user.id, "login_success", "auth", client_ip, None)
                .await;
            self.audit
                .emit(org_id, &user.id, "session_created", "auth", client_ip, None)
                .await;
            self.telemetry
                .emit("login_success", serde_json::json!({"org_id": org_id, "user_id": user.id}));
            return Ok(result);
        }

        if !user.has_phone() {
            let intent = self
                .mfa_intents
                .create(&user.id, org_id, &device.id, now + chrono::Duration::minutes(10))
                .await?;
            return Ok(AuthResult::PhoneRequired {
                intent_id: intent.id,
            });
        }

        self.begin_mfa_challenge(&user.id, org_id, &device.id, user.phone.as_deref().unwrap())
            .await
    }

    async fn begin_mfa_challenge(
        &self,
        user_id: &str,
        org_id: &str,
        device_id: &str,
        phone: &str,
    ) -> Result<AuthResult> {
        let otp = generate_otp();
        let code_hash = hash_otp(&otp);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.mfa_challenge_ttl).unwrap_or(chrono::Duration::minutes(10));

        let challenge = self
            .mfa_challenges
            .create(user_id, org_id, device_id, phone, &code_hash, expires_at)
            .await?;

        if let Some(store) = &self.dev_otp_store {
            store.put(&challenge.id, &otp, expires_at);
        } else if let Err(err) = self.otp_sender.send(phone, &otp).await {
            self.mfa_challenges.delete(&challenge.id).await.ok();
            return Err(err);
        }

        Ok(AuthResult::MfaRequired {
            challenge_id: challenge.id,
            phone_mask: mask_phone(phone),
        })
    }

    // ---- SubmitPhoneAndRequestMFA ----

    pub async fn submit_phone_and_request_mfa(
        &self,
        intent_id: &str,
        phone: &str,
    ) -> Result<AuthResult> {
        validate_phone(phone)?;

        let intent = self
            .mfa_intents
            .find_by_id(intent_id)
            .await?
            .ok_or(AppError::InvalidMfaIntent)?;

        if intent.is_expired(Utc::now()) {
            self.mfa_intents.delete(&intent.id).await.ok();
            return Err(AppError::InvalidMfaIntent);
        }

        self.mfa_intents.delete(&intent.id).await?;

        self.begin_mfa_challenge(&intent.user_id, &intent.org_id, &intent.device_id, phone)
            .await
    }

    // ---- VerifyMFA ----

    pub async fn verify_mfa(&self, challenge_id: &str, otp: &str, client_ip: &str) -> Result<AuthResult> {
        let challenge = self
            .mfa_challenges
            .find_by_id(challenge_id)
            .await?
            .ok_or(AppError::InvalidMfaChallenge)?;

        if challenge.is_expired(Utc::now()) {
            return Err(AppError::ChallengeExpired);
        }

        if !otp_equal(otp, &challenge.code_hash) {
            return Err(AppError::InvalidOtp);
        }

        let user = self
            .users
            .find_by_id(&challenge.user_id)
            .await?
            .ok_or(AppError::InvalidMfaChallenge)?;

        if !user.has_phone() || !user.phone_verified {
            self.users
                .set_phone_verified(&user.id, &challenge.phone)
                .await?;
        }

        let device = self
            .devices
            .find_by_id(&challenge.device_id)
            .await?
            .ok_or(AppError::InvalidMfaChallenge)?;

        let platform = self.platform_settings.get().await.unwrap_or_default();
        let org_settings = self
            .org_mfa_settings
            .get_by_org(&challenge.org_id)
            .await
            .unwrap_or(None)
            .unwrap_or_else(|| crate::models::settings::OrgMfaSettings::defaults_for(&challenge.org_id));
        let now = Utc::now();
        let policy_input = PolicyInput::from_settings(
            &platform,
            &org_settings,
            false,
            device.is_effectively_trusted(now),
            true,
        );
        let org_rules = self
            .org_policy_rules
            .list_enabled_by_org(&challenge.org_id)
            .await
            .unwrap_or_default();
        let policy = self.policy.evaluate(&policy_input, &org_rules);

        let result = self
            .create_session_and_issue_tokens(&challenge.user_id, &challenge.org_id, &device.id, Some(client_ip))
            .await?;

        if policy.register_trust_after_mfa {
            let trusted_until = now + chrono::Duration::days(policy.trust_ttl_days);
            if let Err(err) = self.devices.update_trust(&device.id, true, Some(trusted_until)).await {
                tracing::warn!(error = ?err, device_id = %device.id, "device trust update failed after successful mfa");
            }
        }

        self.mfa_challenges.delete(&challenge.id).await.ok();

        self.audit
            .emit(&challenge.org_id, &challenge.user_id, "login_success", "auth", client_ip, None)
            .await;
        self.audit
            .emit(&challenge.org_id, &challenge.user_id, "session_created", "auth", client_ip, None)
            .await;
        self.telemetry.emit(
            "login_success",
            serde_json::json!({"org_id": challenge.org_id, "user_id": challenge.user_id}),
        );

        Ok(result)
    }

    // ---- Refresh ----

    pub async fn refresh(
        &self,
        refresh_token: &str,
        device_fingerprint: Option<&str>,
        client_ip: &str,
    ) -> Result<AuthResult> {
        if refresh_token.is_empty() {
            return Err(AppError::InvalidRefreshToken);
        }

        let claims = self
            .token_signer
            .verify(refresh_token, TokenType::Refresh)
            .map_err(|_| AppError::InvalidRefreshToken)?;

        let session = self
            .sessions
            .find_by_id(&claims.session_id)
            .await?
            .filter(|s| !s.is_revoked())
            .ok_or(AppError::InvalidRefreshToken)?;

        if session.refresh_jti != claims.jti {
            self.sessions.revoke_all_by_user(&session.user_id).await.ok();
            return Err(AppError::RefreshTokenReuse);
        }

        if !session.refresh_token_hash.is_empty()
            && !refresh_token_hash_equal(refresh_token, &session.refresh_token_hash)
        {
            return Err(AppError::InvalidRefreshToken);
        }

        self.sessions.update_last_seen(&session.id, Some(client_ip)).await.ok();

        let fingerprint = device_fingerprint
            .filter(|f| !f.is_empty())
            .unwrap_or(crate::models::device::DEFAULT_DEVICE_FINGERPRINT);
        let (device, is_new_device) = match self
            .devices
            .find_by_triple(&session.user_id, &session.org_id, fingerprint)
            .await?
        {
            Some(device) => (device, false),
            None => (
                self.devices.create(&session.user_id, &session.org_id, fingerprint).await?,
                true,
            ),
        };

        let user = self
            .users
            .find_by_id(&session.user_id)
            .await?
            .ok_or(AppError::InvalidRefreshToken)?;
        let platform = self.platform_settings.get().await.unwrap_or_default();
        let org_settings = self
            .org_mfa_settings
            .get_by_org(&session.org_id)
            .await
            .unwrap_or(None)
            .unwrap_or_else(|| crate::models::settings::OrgMfaSettings::defaults_for(&session.org_id));
        let now = Utc::now();
        let policy_input = PolicyInput::from_settings(
            &platform,
            &org_settings,
            is_new_device,
            device.is_effectively_trusted(now),
            user.has_phone(),
        );
        let org_rules = self
            .org_policy_rules
            .list_enabled_by_org(&session.org_id)
            .await
            .unwrap_or_default();
        let policy = self.policy.evaluate(&policy_input, &org_rules);

        if policy.mfa_required {
            self.sessions.revoke(&session.id).await.ok();

            if !user.has_phone() {
                let intent = self
                    .mfa_intents
                    .create(&user.id, &session.org_id, &device.id, now + chrono::Duration::minutes(10))
                    .await?;
                return Ok(AuthResult::PhoneRequired {
                    intent_id: intent.id,
                });
            }
            return self
                .begin_mfa_challenge(&user.id, &session.org_id, &device.id, user.phone.as_deref().unwrap())
                .await;
        }

        let refresh_issued = self.token_signer.issue_refresh_token(&user.id, &session.org_id, &session.id)?;
        let access_issued = self.token_signer.issue_access_token(&user.id, &session.org_id, &session.id)?;
        let new_hash = hash_refresh_token(&refresh_issued.token);

        let applied = self
            .sessions
            .update_refresh_fields_if_jti_matches(&session.id, &claims.jti, &refresh_issued.jti, &new_hash)
            .await?;

        if !applied {
            self.sessions.revoke_all_by_user(&session.user_id).await.ok();
            return Err(AppError::RefreshTokenReuse);
        }

        Ok(AuthResult::Tokens {
            access_token: access_issued.token,
            refresh_token: refresh_issued.token,
            expires_at: access_issued.expires_at,
            user_id: user.id,
            org_id: session.org_id,
        })
    }

    // ---- Logout ----

    pub async fn logout(&self, refresh_token: Option<&str>, context_session_id: Option<&str>, client_ip: &str) -> Result<()> {
        let session_id = if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
            self.token_signer
                .verify(token, TokenType::Refresh)
                .ok()
                .map(|claims| claims.session_id)
        } else {
            context_session_id.map(|s| s.to_string())
        };

        if let Some(session_id) = session_id {
            if let Ok(Some(session)) = self.sessions.find_by_id(&session_id).await {
                self.sessions.revoke(&session.id).await.ok();
                self.audit
                    .emit(&session.org_id, &session.user_id, "logout", "auth", client_ip, None)
                    .await;
                self.telemetry.emit(
                    "logout",
                    serde_json::json!({"org_id": session.org_id, "user_id": session.user_id}),
                );
            }
        }

        Ok(())
    }

    async fn create_session_and_issue_tokens(
        &self,
        user_id: &str,
        org_id: &str,
        device_id: &str,
        client_ip: Option<&str>,
    ) -> Result<AuthResult> {
        let session_id = Uuid::new_v4().to_string();
        let refresh_issued = self.token_signer.issue_refresh_token(user_id, org_id, &session_id)?;
        let access_issued = self.token_signer.issue_access_token(user_id, org_id, &session_id)?;
        let refresh_hash = hash_refresh_token(&refresh_issued.token);

        self.sessions
            .create(
                &session_id,
                user_id,
                org_id,
                device_id,
                refresh_issued.expires_at,
                client_ip,
                &refresh_issued.jti,
                &refresh_hash,
            )
            .await?;

        self.telemetry.emit(
            "session_created",
            serde_json::json!({"org_id": org_id, "user_id": user_id, "session_id": session_id}),
        );

        Ok(AuthResult::Tokens {
            access_token: access_issued.token,
            refresh_token: refresh_issued.token,
            expires_at: access_issued.expires_at,
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
        })
    }
}

/// 10-15 digits with an optional leading '+'.
pub fn validate_phone(phone: &str) -> Result<()> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::InvalidArgument("phone must be 10-15 digits with an optional leading +".to_string()));
    }
    let len = digits.chars().count();
    if !(10..=15).contains(&len) {
        return Err(AppError::InvalidArgument("phone must be 10-15 digits with an optional leading +".to_string()));
    }
    Ok(())
}
