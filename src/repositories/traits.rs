// External collaborator interfaces. Concrete adapters live in `repositories::pg`
// (Postgres) and alongside this module (in-memory dev OTP store). Each trait
// is the minimal accessor surface the authentication service depends on —
// CRUD beyond that is out of scope.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::middleware::error_handling::Result;
use crate::models::device::Device;
use crate::models::organization::Membership;
use crate::models::session::{MfaChallenge, MfaIntent, Session};
use crate::models::settings::{OrgMfaSettings, OrgPolicyRule, PlatformSettings};
use crate::models::user::{Identity, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn create(&self, email: &str, display_name: Option<&str>) -> Result<User>;
    async fn set_phone_verified(&self, user_id: &str, phone: &str) -> Result<()>;
}

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn find_by_user_and_provider(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<Identity>>;
    async fn create(&self, user_id: &str, provider: &str, provider_id: &str, password_hash: &str) -> Result<Identity>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>>;
    /// `id` is caller-generated: the session id must be embedded in the
    /// access/refresh token claims before the row exists, so it can't be
    /// assigned by the repository.
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
    ) -> Result<Session>;
    async fn revoke(&self, id: &str) -> Result<()>;
    async fn revoke_all_by_user(&self, user_id: &str) -> Result<u64>;
    /// Atomically updates rotation fields only if `expected_refresh_jti`
    /// still matches the stored value, returning whether the update applied.
    /// This is the compare-and-set primitive that makes concurrent refresh
    /// attempts resolve to exactly one winner.
    async fn update_refresh_fields_if_jti_matches(
        &self,
        id: &str,
        expected_refresh_jti: &str,
        new_refresh_jti: &str,
        new_refresh_token_hash: &str,
    ) -> Result<bool>;
    async fn update_last_seen(&self, id: &str, ip_address: Option<&str>) -> Result<()>;
}

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Device>>;
    async fn find_by_triple(
        &self,
        user_id: &str,
        org_id: &str,
        fingerprint: &str,
    ) -> Result<Option<Device>>;
    async fn create(&self, user_id: &str, org_id: &str, fingerprint: &str) -> Result<Device>;
    async fn update_trust(
        &self,
        id: &str,
        trusted: bool,
        trusted_until: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn find_by_user_and_org(&self, user_id: &str, org_id: &str) -> Result<Option<Membership>>;
}

#[async_trait]
pub trait PlatformSettingsRepository: Send + Sync {
    async fn get(&self) -> Result<PlatformSettings>;
}

#[async_trait]
pub trait OrgMfaSettingsRepository: Send + Sync {
    async fn get_by_org(&self, org_id: &str) -> Result<Option<OrgMfaSettings>>;
}

#[async_trait]
pub trait OrgPolicyRuleRepository: Send + Sync {
    async fn list_enabled_by_org(&self, org_id: &str) -> Result<Vec<OrgPolicyRule>>;
}

#[async_trait]
pub trait MfaChallengeRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<MfaChallenge>>;
    async fn create(
        &self,
        user_id: &str,
        org_id: &str,
        device_id: &str,
        phone: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<MfaChallenge>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait MfaIntentRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<MfaIntent>>;
    async fn create(
        &self,
        user_id: &str,
        org_id: &str,
        device_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<MfaIntent>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, phone: &str, otp: &str) -> Result<()>;
}

#[async_trait]
pub trait DevOtpStore: Send + Sync {
    fn put(&self, challenge_id: &str, otp: &str, expires_at: DateTime<Utc>);
    fn get(&self, challenge_id: &str) -> Option<String>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn log_event(
        &self,
        org_id: &str,
        user_id: &str,
        action: &str,
        resource: &str,
        ip: &str,
        metadata: Option<serde_json::Value>,
    );
}

#[async_trait]
pub trait TelemetryEmitter: Send + Sync {
    async fn emit(&self, event: &str, metadata: serde_json::Value);
}
