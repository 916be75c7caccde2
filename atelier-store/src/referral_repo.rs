use async_trait::async_trait;
use atelier_core::referral::ReferralCode;
use atelier_core::repository::{ReferralRepository, StoreError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct PgReferralRepository {
    pool: PgPool,
}

impl PgReferralRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReferralRow {
    code: String,
    staff_name: String,
    discount_percent: i32,
    created_at: DateTime<Utc>,
}

impl From<ReferralRow> for ReferralCode {
    fn from(row: ReferralRow) -> Self {
        ReferralCode {
            code: row.code,
            staff_name: row.staff_name,
            discount_percent: row.discount_percent,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ReferralRepository for PgReferralRepository {
    async fn get(&self, code: &str) -> Result<Option<ReferralCode>, StoreError> {
        let row: Option<ReferralRow> = sqlx::query_as(
            "SELECT code, staff_name, discount_percent, created_at \
             FROM referral_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ReferralCode::from))
    }

    async fn list(&self) -> Result<Vec<ReferralCode>, StoreError> {
        let rows: Vec<ReferralRow> = sqlx::query_as(
            "SELECT code, staff_name, discount_percent, created_at \
             FROM referral_codes ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ReferralCode::from).collect())
    }

    async fn create(&self, referral: &ReferralCode) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO referral_codes (code, staff_name, discount_percent, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&referral.code)
        .bind(&referral.staff_name)
        .bind(referral.discount_percent)
        .bind(referral.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, code: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM referral_codes WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
