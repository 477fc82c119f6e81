use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repositories::traits::AuditRepository;

pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    /// Best-effort: failures are logged, never propagated to the caller.
    async fn log_event(
        &self,
        org_id: &str,
        user_id: &str,
        action: &str,
        resource: &str,
        ip: &str,
        metadata: Option<serde_json::Value>,
    ) {
        let id = Uuid::new_v4().to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (id, org_id, user_id, action, resource, client_ip, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            "#,
        )
        .bind(&id)
        .bind(org_id)
        .bind(user_id)
        .bind(action)
        .bind(resource)
        .bind(ip)
        .bind(metadata)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            tracing::warn!(error = ?err, action, resource, "audit log write failed");
        }
    }
}
