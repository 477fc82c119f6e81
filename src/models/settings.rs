use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlatformSettings {
    pub mfa_required_always: bool,
    pub default_trust_ttl_days: i64,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            mfa_required_always: false,
            default_trust_ttl_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrgMfaSettings {
    pub org_id: String,
    pub mfa_required_for_new_device: bool,
    pub mfa_required_for_untrusted: bool,
    pub mfa_required_always: bool,
    pub register_trust_after_mfa: bool,
    pub trust_ttl_days: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrgMfaSettings {
    pub fn defaults_for(org_id: &str) -> Self {
        let now = Utc::now();
        Self {
            org_id: org_id.to_string(),
            mfa_required_for_new_device: false,
            mfa_required_for_untrusted: false,
            mfa_required_always: false,
            register_trust_after_mfa: true,
            trust_ttl_days: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One org-scoped, enabled rule module in package `auth.device_trust`.
///
/// `mfa_required_when` is a list of conditions ANDed together; if they all
/// match, this module votes `mfa_required = true`. Multiple enabled modules
/// for the same org are combined by disjunction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrgPolicyRule {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub enabled: bool,
    pub rule_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
