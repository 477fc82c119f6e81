use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::user::User;
use crate::repositories::traits::UserRepository;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, email: &str, display_name: Option<&str>) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, display_name, status, phone, phone_verified, created_at, updated_at)
            VALUES ($1, $2, $3, 'active', NULL, false, $4, $4)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(display_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_phone_verified(&self, user_id: &str, phone: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET phone = $2, phone_verified = true, updated_at = $3
            WHERE id = $1 AND (phone IS NULL OR phone_verified = false)
            "#,
        )
        .bind(user_id)
        .bind(phone)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
