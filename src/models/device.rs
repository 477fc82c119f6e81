use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Device fingerprint used when the client supplies none, so every login
/// still yields a stable device row within (user, org).
pub const DEFAULT_DEVICE_FINGERPRINT: &str = "unknown-device";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Device {
    pub id: String,
    pub user_id: String,
    pub org_id: String,
    pub fingerprint: String,
    pub trusted: bool,
    pub trusted_until: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// trusted ∧ not revoked ∧ (no expiry or expiry in the future).
    pub fn is_effectively_trusted(&self, now: DateTime<Utc>) -> bool {
        self.trusted
            && self.revoked_at.is_none()
            && self.trusted_until.map(|until| until > now).unwrap_or(true)
    }
}
