use async_trait::async_trait;
use sqlx::PgPool;

use crate::middleware::error_handling::Result;
use crate::models::settings::{OrgMfaSettings, OrgPolicyRule, PlatformSettings};
use crate::repositories::traits::{OrgMfaSettingsRepository, OrgPolicyRuleRepository, PlatformSettingsRepository};

pub struct PgPlatformSettingsRepository {
    pool: PgPool,
}

impl PgPlatformSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlatformSettingsRepository for PgPlatformSettingsRepository {
    async fn get(&self) -> Result<PlatformSettings> {
        let settings = sqlx::query_as::<_, PlatformSettings>(
            "SELECT mfa_required_always, default_trust_ttl_days FROM platform_settings LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or_default();
        Ok(settings)
    }
}

pub struct PgOrgMfaSettingsRepository {
    pool: PgPool,
}

impl PgOrgMfaSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrgMfaSettingsRepository for PgOrgMfaSettingsRepository {
    async fn get_by_org(&self, org_id: &str) -> Result<Option<OrgMfaSettings>> {
        let settings = sqlx::query_as::<_, OrgMfaSettings>(
            "SELECT * FROM org_mfa_settings WHERE org_id = $1",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }
}

pub struct PgOrgPolicyRuleRepository {
    pool: PgPool,
}

impl PgOrgPolicyRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrgPolicyRuleRepository for PgOrgPolicyRuleRepository {
    async fn list_enabled_by_org(&self, org_id: &str) -> Result<Vec<OrgPolicyRule>> {
        let rules = sqlx::query_as::<_, OrgPolicyRule>(
            "SELECT * FROM org_policy_rules WHERE org_id = $1 AND enabled = true",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rules)
    }
}
