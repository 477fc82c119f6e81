use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::device::Device;
use crate::repositories::traits::DeviceRepository;

pub struct PgDeviceRepository {
    pool: PgPool,
}

impl PgDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRepository for PgDeviceRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Device>> {
        let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(device)
    }

    async fn find_by_triple(
        &self,
        user_id: &str,
        org_id: &str,
        fingerprint: &str,
    ) -> Result<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            "SELECT * FROM devices WHERE user_id = $1 AND org_id = $2 AND fingerprint = $3",
        )
        .bind(user_id)
        .bind(org_id)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(device)
    }

    async fn create(&self, user_id: &str, org_id: &str, fingerprint: &str) -> Result<Device> {
        let id = Uuid::new_v4().to_string();
        // Concurrent first-logins from the same new device race on the
        // (user_id, org_id, fingerprint) unique index; fold into an update
        // of the existing row instead of erroring so both callers converge
        // on the one device.
        let device = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (
                id, user_id, org_id, fingerprint, trusted, trusted_until, revoked_at, last_seen_at, created_at
            )
            VALUES ($1, $2, $3, $4, false, NULL, NULL, $5, $5)
            ON CONFLICT (user_id, org_id, fingerprint)
            DO UPDATE SET last_seen_at = devices.last_seen_at
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(org_id)
        .bind(fingerprint)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(device)
    }

    async fn update_trust(
        &self,
        id: &str,
        trusted: bool,
        trusted_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE devices SET trusted = $2, trusted_until = $3, last_seen_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(trusted)
        .bind(trusted_until)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
