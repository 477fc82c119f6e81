// End-to-end exercises of AuthService against in-memory fakes of every
// repository trait. No database, no network: these pin down the
// orchestration in auth_service.rs (who calls whom, in what order, what
// state changes) rather than any one repository's SQL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use uuid::Uuid;

use zerotrust_auth_core::middleware::error_handling::{AppError, Result};
use zerotrust_auth_core::models::device::Device;
use zerotrust_auth_core::models::dto::AuthResult;
use zerotrust_auth_core::models::organization::{Membership, MembershipRole};
use zerotrust_auth_core::models::session::{MfaChallenge, MfaIntent, Session};
use zerotrust_auth_core::models::settings::{OrgMfaSettings, OrgPolicyRule, PlatformSettings};
use zerotrust_auth_core::models::user::{Identity, User, UserStatus};
use zerotrust_auth_core::repositories::dev_otp_store::InMemoryDevOtpStore;
use zerotrust_auth_core::repositories::traits::{
    AuditRepository, DeviceRepository, DevOtpStore, IdentityRepository, MembershipRepository,
    MfaChallengeRepository, MfaIntentRepository, OrgMfaSettingsRepository,
    OrgPolicyRuleRepository, OtpSender, PlatformSettingsRepository, SessionRepository,
    UserRepository,
};
use zerotrust_auth_core::services::auth_service::{AuthService, AuthServiceDeps};
use zerotrust_auth_core::services::password_hasher::PasswordHasher;
use zerotrust_auth_core::services::policy_evaluator::default_ruleset_template;
use zerotrust_auth_core::services::telemetry::{NoopTelemetryEmitter, Telemetry};
use zerotrust_auth_core::services::token_signer::TokenSigner;

const ORG: &str = "org-1";

#[derive(Default)]
struct FakeUsers(Mutex<HashMap<String, User>>);

#[async_trait]
impl UserRepository for FakeUsers {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.0.lock().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.0.lock().unwrap().values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, email: &str, display_name: Option<&str>) -> Result<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
            status: UserStatus::Active,
            phone: None,
            phone_verified: false,
            created_at: now,
            updated_at: now,
        };
        self.0.lock().unwrap().insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn set_phone_verified(&self, user_id: &str, phone: &str) -> Result<()> {
        let mut guard = self.0.lock().unwrap();
        let user = guard.get_mut(user_id).expect("user must exist");
        user.phone = Some(phone.to_string());
        user.phone_verified = true;
        Ok(())
    }
}

#[derive(Default)]
struct FakeIdentities(Mutex<HashMap<(String, String), Identity>>);

#[async_trait]
impl IdentityRepository for FakeIdentities {
    async fn find_by_user_and_provider(&self, user_id: &str, provider: &str) -> Result<Option<Identity>> {
        Ok(self.0.lock().unwrap().get(&(user_id.to_string(), provider.to_string())).cloned())
    }

    async fn create(&self, user_id: &str, provider: &str, provider_id: &str, password_hash: &str) -> Result<Identity> {
        let identity = Identity {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            provider: provider.to_string(),
            provider_id: provider_id.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        self.0
            .lock()
            .unwrap()
            .insert((user_id.to_string(), provider.to_string()), identity.clone());
        Ok(identity)
    }
}

#[derive(Default)]
struct FakeSessions(Mutex<HashMap<String, Session>>);

#[async_trait]
impl SessionRepository for FakeSessions {
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.0.lock().unwrap().get(id).cloned())
    }

    async fn create(
        &self,
        id: &str,
        user_id: &str,
        org_id: &str,
        device_id: &str,
        expires_at: DateTime<Utc>,
        ip_address: Option<&str>,
        refresh_jti: &str,
        refresh_token_hash: &str,
    ) -> Result<Session> {
        let session = Session {
            id: id.to_string(),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
            device_id: device_id.to_string(),
            expires_at,
            revoked_at: None,
            last_seen_at: None,
            ip_address: ip_address.map(str::to_string),
            refresh_jti: refresh_jti.to_string(),
            refresh_token_hash: refresh_token_hash.to_string(),
            created_at: Utc::now(),
        };
        self.0.lock().unwrap().insert(id.to_string(), session.clone());
        Ok(session)
    }

    async fn revoke(&self, id: &str) -> Result<()> {
        if let Some(session) = self.0.lock().unwrap().get_mut(id) {
            session.revoked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn revoke_all_by_user(&self, user_id: &str) -> Result<u64> {
        let mut guard = self.0.lock().unwrap();
        let now = Utc::now();
        let mut count = 0;
        for session in guard.values_mut().filter(|s| s.user_id == user_id) {
            session.revoked_at = Some(now);
            count += 1;
        }
        Ok(count)
    }

    async fn update_refresh_fields_if_jti_matches(
        &self,
        id: &str,
        expected_refresh_jti: &str,
        new_refresh_jti: &str,
        new_refresh_token_hash: &str,
    ) -> Result<bool> {
        let mut guard = self.0.lock().unwrap();
        match guard.get_mut(id) {
            Some(session) if session.refresh_jti == expected_refresh_jti => {
                session.refresh_jti = new_refresh_jti.to_string();
                session.refresh_token_hash = new_refresh_token_hash.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_last_seen(&self, id: &str, ip_address: Option<&str>) -> Result<()> {
        if let Some(session) = self.0.lock().unwrap().get_mut(id) {
            session.last_seen_at = Some(Utc::now());
            if let Some(ip) = ip_address {
                session.ip_address = Some(ip.to_string());
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct FakeDevices(Mutex<HashMap<String, Device>>);

#[async_trait]
impl DeviceRepository for FakeDevices {
    async fn find_by_id(&self, id: &str) -> Result<Option<Device>> {
        Ok(self.0.lock().unwrap().get(id).cloned())
    }

    async fn find_by_triple(&self, user_id: &str, org_id: &str, fingerprint: &str) -> Result<Option<Device>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .values()
            .find(|d| d.user_id == user_id && d.org_id == org_id && d.fingerprint == fingerprint)
            .cloned())
    }

    async fn create(&self, user_id: &str, org_id: &str, fingerprint: &str) -> Result<Device> {
        let device = Device {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
            fingerprint: fingerprint.to_string(),
            trusted: false,
            trusted_until: None,
            revoked_at: None,
            last_seen_at: None,
            created_at: Utc::now(),
        };
        self.0.lock().unwrap().insert(device.id.clone(), device.clone());
        Ok(device)
    }

    async fn update_trust(&self, id: &str, trusted: bool, trusted_until: Option<DateTime<Utc>>) -> Result<()> {
        if let Some(device) = self.0.lock().unwrap().get_mut(id) {
            device.trusted = trusted;
            device.trusted_until = trusted_until;
        }
        Ok(())
    }
}

#[derive(Default)]
struct FakeMemberships(Mutex<Vec<Membership>>);

impl FakeMemberships {
    fn insert(&self, membership: Membership) {
        self.0.lock().unwrap().push(membership);
    }
}

#[async_trait]
impl MembershipRepository for FakeMemberships {
    async fn find_by_user_and_org(&self, user_id: &str, org_id: &str) -> Result<Option<Membership>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.org_id == org_id)
            .cloned())
    }
}

struct FakePlatformSettings(Mutex<PlatformSettings>);

impl Default for FakePlatformSettings {
    fn default() -> Self {
        Self(Mutex::new(PlatformSettings::default()))
    }
}

#[async_trait]
impl PlatformSettingsRepository for FakePlatformSettings {
    async fn get(&self) -> Result<PlatformSettings> {
        Ok(self.0.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakeOrgMfaSettings(Mutex<HashMap<String, OrgMfaSettings>>);

impl FakeOrgMfaSettings {
    fn insert(&self, settings: OrgMfaSettings) {
        self.0.lock().unwrap().insert(settings.org_id.clone(), settings);
    }
}

#[async_trait]
impl OrgMfaSettingsRepository for FakeOrgMfaSettings {
    async fn get_by_org(&self, org_id: &str) -> Result<Option<OrgMfaSettings>> {
        Ok(self.0.lock().unwrap().get(org_id).cloned())
    }
}

#[derive(Default)]
struct FakeOrgPolicyRules(Mutex<Vec<OrgPolicyRule>>);

impl FakeOrgPolicyRules {
    fn insert(&self, rule: OrgPolicyRule) {
        self.0.lock().unwrap().push(rule);
    }
}

#[async_trait]
impl OrgPolicyRuleRepository for FakeOrgPolicyRules {
    async fn list_enabled_by_org(&self, org_id: &str) -> Result<Vec<OrgPolicyRule>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.org_id == org_id && r.enabled)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct FakeMfaChallenges(Mutex<HashMap<String, MfaChallenge>>);

#[async_trait]
impl MfaChallengeRepository for FakeMfaChallenges {
    async fn find_by_id(&self, id: &str) -> Result<Option<MfaChallenge>> {
        Ok(self.0.lock().unwrap().get(id).cloned())
    }

    async fn create(
        &self,
        user_id: &str,
        org_id: &str,
        device_id: &str,
        phone: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<MfaChallenge> {
        let challenge = MfaChallenge {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
            device_id: device_id.to_string(),
            phone: phone.to_string(),
            code_hash: code_hash.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        self.0.lock().unwrap().insert(challenge.id.clone(), challenge.clone());
        Ok(challenge)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.0.lock().unwrap().remove(id);
        Ok(())
    }
}

#[derive(Default)]
struct FakeMfaIntents(Mutex<HashMap<String, MfaIntent>>);

#[async_trait]
impl MfaIntentRepository for FakeMfaIntents {
    async fn find_by_id(&self, id: &str) -> Result<Option<MfaIntent>> {
        Ok(self.0.lock().unwrap().get(id).cloned())
    }

    async fn create(
        &self,
        user_id: &str,
        org_id: &str,
        device_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<MfaIntent> {
        let intent = MfaIntent {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
            device_id: device_id.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        self.0.lock().unwrap().insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.0.lock().unwrap().remove(id);
        Ok(())
    }
}

struct FakeOtpSender;

#[async_trait]
impl OtpSender for FakeOtpSender {
    async fn send(&self, _phone: &str, _otp: &str) -> Result<()> {
        panic!("otp sender should not be invoked while a dev OTP store is configured");
    }
}

#[derive(Default)]
struct FakeAudit(Mutex<Vec<String>>);

#[async_trait]
impl AuditRepository for FakeAudit {
    async fn log_event(
        &self,
        _org_id: &str,
        _user_id: &str,
        action: &str,
        _resource: &str,
        _ip: &str,
        _metadata: Option<serde_json::Value>,
    ) {
        self.0.lock().unwrap().push(action.to_string());
    }
}

struct Harness {
    service: AuthService,
    users: Arc<FakeUsers>,
    devices: Arc<FakeDevices>,
    memberships: Arc<FakeMemberships>,
    org_mfa_settings: Arc<FakeOrgMfaSettings>,
    org_policy_rules: Arc<FakeOrgPolicyRules>,
    sessions: Arc<FakeSessions>,
    dev_otp_store: Arc<InMemoryDevOtpStore>,
    audit: Arc<FakeAudit>,
}

fn token_signer() -> TokenSigner {
    let secret = b"integration-test-secret";
    TokenSigner::new(
        Arc::new(EncodingKey::from_secret(secret)),
        Arc::new(DecodingKey::from_secret(secret)),
        Algorithm::HS256,
        "zerotrust-auth-core-tests".to_string(),
        "zerotrust-auth-core-tests".to_string(),
        Duration::from_secs(900),
        Duration::from_secs(60 * 60 * 24 * 30),
    )
}

fn build_harness() -> Harness {
    let users = Arc::new(FakeUsers::default());
    let identities = Arc::new(FakeIdentities::default());
    let sessions = Arc::new(FakeSessions::default());
    let devices = Arc::new(FakeDevices::default());
    let memberships = Arc::new(FakeMemberships::default());
    let platform_settings = Arc::new(FakePlatformSettings::default());
    let org_mfa_settings = Arc::new(FakeOrgMfaSettings::default());
    let org_policy_rules = Arc::new(FakeOrgPolicyRules::default());
    let mfa_challenges = Arc::new(FakeMfaChallenges::default());
    let mfa_intents = Arc::new(FakeMfaIntents::default());
    let dev_otp_store = Arc::new(InMemoryDevOtpStore::new());
    let audit = Arc::new(FakeAudit::default());

    let service = AuthService::new(
        AuthServiceDeps {
            users: users.clone(),
            identities,
            sessions: sessions.clone(),
            devices: devices.clone(),
            memberships,
            platform_settings,
            org_mfa_settings: org_mfa_settings.clone(),
            org_policy_rules: org_policy_rules.clone(),
            mfa_challenges,
            mfa_intents,
            otp_sender: Arc::new(FakeOtpSender),
            dev_otp_store: Some(dev_otp_store.clone()),
            audit: audit.clone(),
            telemetry: Telemetry::new(Arc::new(NoopTelemetryEmitter)),
        },
        PasswordHasher::new(10),
        token_signer(),
        Duration::from_secs(600),
    );

    Harness {
        service,
        users,
        devices,
        memberships,
        org_mfa_settings,
        org_policy_rules,
        sessions,
        dev_otp_store,
        audit,
    }
}

fn membership(user_id: &str, org_id: &str) -> Membership {
    Membership {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        org_id: org_id.to_string(),
        role: MembershipRole::Member,
        created_at: Utc::now(),
    }
}

const PASSWORD: &str = "Correct-Horse1!";

#[tokio::test]
async fn register_then_duplicate_email_is_rejected() {
    let harness = build_harness();

    let user_id = harness
        .service
        .register("new@example.com", PASSWORD, Some("New User"))
        .await
        .unwrap();
    assert!(!user_id.is_empty());

    let err = harness
        .service
        .register("NEW@example.com", PASSWORD, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmailAlreadyRegistered));
}

#[tokio::test]
async fn register_rejects_weak_password() {
    let harness = build_harness();
    let err = harness.service.register("weak@example.com", "short", None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[tokio::test]
async fn verify_credentials_round_trips() {
    let harness = build_harness();
    let user_id = harness.service.register("verify@example.com", PASSWORD, None).await.unwrap();

    let verified = harness.service.verify_credentials("verify@example.com", PASSWORD).await.unwrap();
    assert_eq!(verified, user_id);

    let err = harness
        .service
        .verify_credentials("verify@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
}

#[tokio::test]
async fn login_without_mfa_requirement_issues_tokens() {
    let harness = build_harness();
    let user_id = harness.service.register("login@example.com", PASSWORD, None).await.unwrap();
    {
        let mut guard = harness.users.0.lock().unwrap();
        let user = guard.get_mut(&user_id).unwrap();
        user.phone = Some("+15551234567".to_string());
        user.phone_verified = true;
    }
    harness.memberships.insert(membership(&user_id, ORG));

    // An org with an already-trusted device and no MFA settings enabled.
    let device = harness.devices.create(&user_id, ORG, "device-a").await.unwrap();
    harness.devices.update_trust(&device.id, true, None).await.unwrap();

    let result = harness
        .service
        .login("login@example.com", PASSWORD, ORG, Some("device-a"), "203.0.113.5")
        .await
        .unwrap();

    match result {
        AuthResult::Tokens { user_id: returned, org_id, .. } => {
            assert_eq!(returned, user_id);
            assert_eq!(org_id, ORG);
        }
        other => panic!("expected tokens, got {other:?}"),
    }

    assert!(harness.sessions.0.lock().unwrap().values().any(|s| s.user_id == user_id));
    assert!(harness.audit.0.lock().unwrap().contains(&"login_success".to_string()));
}

#[tokio::test]
async fn login_requires_mfa_for_new_untrusted_device() {
    let harness = build_harness();
    let user_id = harness.service.register("mfa@example.com", PASSWORD, None).await.unwrap();
    {
        let mut guard = harness.users.0.lock().unwrap();
        let user = guard.get_mut(&user_id).unwrap();
        user.phone = Some("+15559876543".to_string());
        user.phone_verified = true;
    }
    harness.memberships.insert(membership(&user_id, ORG));

    harness.org_mfa_settings.insert(OrgMfaSettings {
        org_id: ORG.to_string(),
        mfa_required_for_new_device: true,
        mfa_required_for_untrusted: false,
        mfa_required_always: false,
        register_trust_after_mfa: true,
        trust_ttl_days: 30,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    });
    // With no enabled policy module the evaluator falls back to the
    // platform-only default, so the org's new-device setting needs an
    // actual module to act on.
    harness.org_policy_rules.insert(OrgPolicyRule {
        id: Uuid::new_v4().to_string(),
        org_id: ORG.to_string(),
        name: "mfa-on-new-device".to_string(),
        enabled: true,
        rule_json: serde_json::to_value(default_ruleset_template()[1].clone()).unwrap(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    });

    let result = harness
        .service
        .login("mfa@example.com", PASSWORD, ORG, Some("brand-new-device"), "203.0.113.6")
        .await
        .unwrap();

    let challenge_id = match result {
        AuthResult::MfaRequired { challenge_id, phone_mask } => {
            assert!(phone_mask.contains('*'));
            challenge_id
        }
        other => panic!("expected mfa required, got {other:?}"),
    };

    let otp = harness.dev_otp_store.get(&challenge_id).expect("dev otp store captures the code");

    let verified = harness.service.verify_mfa(&challenge_id, &otp, "203.0.113.6").await.unwrap();
    match verified {
        AuthResult::Tokens { user_id: returned, .. } => assert_eq!(returned, user_id),
        other => panic!("expected tokens after successful mfa, got {other:?}"),
    }

    let wrong_otp_err = harness.service.verify_mfa(&challenge_id, "000000", "203.0.113.6").await.unwrap_err();
    assert!(matches!(wrong_otp_err, AppError::InvalidMfaChallenge));
}

#[tokio::test]
async fn refresh_rotates_tokens_and_reuse_revokes_all_sessions() {
    let harness = build_harness();
    let user_id = harness.service.register("refresh@example.com", PASSWORD, None).await.unwrap();
    {
        let mut guard = harness.users.0.lock().unwrap();
        let user = guard.get_mut(&user_id).unwrap();
        user.phone = Some("+15550001111".to_string());
        user.phone_verified = true;
    }
    harness.memberships.insert(membership(&user_id, ORG));
    let device = harness.devices.create(&user_id, ORG, "device-b").await.unwrap();
    harness.devices.update_trust(&device.id, true, None).await.unwrap();

    let first = harness
        .service
        .login("refresh@example.com", PASSWORD, ORG, Some("device-b"), "198.51.100.1")
        .await
        .unwrap();
    let (first_refresh, first_session_user) = match first {
        AuthResult::Tokens { refresh_token, user_id, .. } => (refresh_token, user_id),
        other => panic!("expected tokens, got {other:?}"),
    };
    assert_eq!(first_session_user, user_id);

    let rotated = harness
        .service
        .refresh(&first_refresh, Some("device-b"), "198.51.100.1")
        .await
        .unwrap();
    let second_refresh = match rotated {
        AuthResult::Tokens { refresh_token, .. } => refresh_token,
        other => panic!("expected tokens from refresh, got {other:?}"),
    };
    assert_ne!(first_refresh, second_refresh);

    // Reusing the now-superseded first refresh token is a reuse attack: all
    // of the user's sessions must be revoked, not just this one.
    let reuse_err = harness
        .service
        .refresh(&first_refresh, Some("device-b"), "198.51.100.1")
        .await
        .unwrap_err();
    assert!(matches!(reuse_err, AppError::RefreshTokenReuse));

    assert!(harness.sessions.0.lock().unwrap().values().all(|s| s.user_id != user_id || s.is_revoked()));

    // The second (legitimately rotated) token is also now dead, since reuse
    // detection revokes every session belonging to the user.
    let dead_err = harness
        .service
        .refresh(&second_refresh, Some("device-b"), "198.51.100.1")
        .await
        .unwrap_err();
    assert!(matches!(dead_err, AppError::InvalidRefreshToken));
}

#[tokio::test]
async fn logout_revokes_the_session_behind_the_refresh_token() {
    let harness = build_harness();
    let user_id = harness.service.register("logout@example.com", PASSWORD, None).await.unwrap();
    {
        let mut guard = harness.users.0.lock().unwrap();
        let user = guard.get_mut(&user_id).unwrap();
        user.phone = Some("+15552223333".to_string());
        user.phone_verified = true;
    }
    harness.memberships.insert(membership(&user_id, ORG));
    let device = harness.devices.create(&user_id, ORG, "device-c").await.unwrap();
    harness.devices.update_trust(&device.id, true, None).await.unwrap();

    let tokens = harness
        .service
        .login("logout@example.com", PASSWORD, ORG, Some("device-c"), "198.51.100.9")
        .await
        .unwrap();
    let refresh_token = match tokens {
        AuthResult::Tokens { refresh_token, .. } => refresh_token,
        other => panic!("expected tokens, got {other:?}"),
    };

    harness.service.logout(Some(&refresh_token), None, "198.51.100.9").await.unwrap();

    assert!(harness.sessions.0.lock().unwrap().values().any(|s| s.user_id == user_id && s.is_revoked()));
    assert!(harness.audit.0.lock().unwrap().contains(&"logout".to_string()));
}
