use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::middleware::error_handling::Result;
use crate::models::session::Session;
use crate::repositories::traits::SessionRepository;

pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
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
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (
                id, user_id, org_id, device_id, expires_at, revoked_at, last_seen_at,
                ip_address, refresh_jti, refresh_token_hash, created_at
            )
            VALUES ($1, $2, $3, $4, $5, NULL, $6, $7, $8, $9, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(org_id)
        .bind(device_id)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(ip_address)
        .bind(refresh_jti)
        .bind(refresh_token_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn revoke(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_all_by_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = $2 WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn update_refresh_fields_if_jti_matches(
        &self,
        id: &str,
        expected_refresh_jti: &str,
        new_refresh_jti: &str,
        new_refresh_token_hash: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET refresh_jti = $3, refresh_token_hash = $4, last_seen_at = $5
            WHERE id = $1 AND refresh_jti = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .bind(expected_refresh_jti)
        .bind(new_refresh_jti)
        .bind(new_refresh_token_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_last_seen(&self, id: &str, ip_address: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE sessions SET last_seen_at = $2, ip_address = COALESCE($3, ip_address) WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .bind(ip_address)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
