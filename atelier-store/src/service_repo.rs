use async_trait::async_trait;
use atelier_core::repository::{ServiceRepository, StoreError};
use atelier_core::service::Service;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgServiceRepository {
    pool: PgPool,
}

impl PgServiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ServiceRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    duration_minutes: i32,
    price_cents: i64,
    is_active: bool,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

#[async_trait]
impl ServiceRepository for PgServiceRepository {
    async fn list_active(&self) -> Result<Vec<Service>, StoreError> {
        let rows: Vec<ServiceRow> = sqlx::query_as(
            "SELECT id, name, description, duration_minutes, price_cents, is_active, created_at \
             FROM services WHERE is_active ORDER BY price_cents",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Service {
                id: row.id,
                name: row.name,
                description: row.description,
                duration_minutes: row.duration_minutes as u32,
                price_cents: row.price_cents,
                is_active: row.is_active,
            })
            .collect())
    }
}
