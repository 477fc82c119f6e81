use async_trait::async_trait;
use sqlx::PgPool;

use crate::middleware::error_handling::Result;
use crate::models::organization::Membership;
use crate::repositories::traits::MembershipRepository;

pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn find_by_user_and_org(&self, user_id: &str, org_id: &str) -> Result<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE user_id = $1 AND org_id = $2",
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }
}
