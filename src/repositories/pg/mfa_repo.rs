use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::session::{MfaChallenge, MfaIntent};
use crate::repositories::traits::{MfaChallengeRepository, MfaIntentRepository};

pub struct PgMfaChallengeRepository {
    pool: PgPool,
}

impl PgMfaChallengeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MfaChallengeRepository for PgMfaChallengeRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<MfaChallenge>> {
        let challenge = sqlx::query_as::<_, MfaChallenge>("SELECT * FROM mfa_challenges WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(challenge)
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
        let id = Uuid::new_v4().to_string();
        let challenge = sqlx::query_as::<_, MfaChallenge>(
            r#"
            INSERT INTO mfa_challenges (id, user_id, org_id, device_id, phone, code_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(org_id)
        .bind(device_id)
        .bind(phone)
        .bind(code_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(challenge)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM mfa_challenges WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PgMfaIntentRepository {
    pool: PgPool,
}

impl PgMfaIntentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MfaIntentRepository for PgMfaIntentRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<MfaIntent>> {
        let intent = sqlx::query_as::<_, MfaIntent>("SELECT * FROM mfa_intents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(intent)
    }

    async fn create(
        &self,
        user_id: &str,
        org_id: &str,
        device_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<MfaIntent> {
        let id = Uuid::new_v4().to_string();
        let intent = sqlx::query_as::<_, MfaIntent>(
            r#"
            INSERT INTO mfa_intents (id, user_id, org_id, device_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(org_id)
        .bind(device_id)
        .bind(expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(intent)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM mfa_intents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
