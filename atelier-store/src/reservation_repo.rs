use async_trait::async_trait;
use atelier_core::repository::{
    ConfirmOutcome, HoldInsert, ReferralSales, ReservationStore, StoreError,
};
use atelier_core::reservation::{Reservation, ReservationHolder, ReservationStatus};
use atelier_shared::pii::Masked;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres-backed reservation store. The UNIQUE (booking_date, start_time)
/// constraint created in the migrations is the arbiter for racing writers;
/// `ON CONFLICT DO NOTHING` turns the rejection into `SlotTaken` instead of
/// an error.
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    booking_date: NaiveDate,
    start_time: NaiveTime,
    service_id: Uuid,
    duration_minutes: i32,
    kind: String,
    status: String,
    client_name: Option<String>,
    client_email: Option<String>,
    client_phone: Option<String>,
    referral_code: Option<String>,
    final_price_cents: Option<i64>,
    payment_ref: Option<String>,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

impl ReservationRow {
    fn into_domain(self) -> Result<Reservation, StoreError> {
        let holder = match self.kind.as_str() {
            "ADMIN_BLOCK" => ReservationHolder::AdminBlock,
            "CUSTOMER" => ReservationHolder::Customer {
                name: self.client_name.unwrap_or_default(),
                email: Masked(self.client_email.unwrap_or_default()),
                phone: Masked(self.client_phone.unwrap_or_default()),
            },
            other => return Err(format!("unknown reservation kind: {other}").into()),
        };

        Ok(Reservation {
            id: self.id,
            booking_date: self.booking_date,
            start_time: self.start_time,
            service_id: self.service_id,
            duration_minutes: self.duration_minutes as u32,
            holder,
            status: self.status.parse::<ReservationStatus>()?,
            referral_code: self.referral_code,
            final_price_cents: self.final_price_cents,
            payment_ref: self.payment_ref,
            created_at: self.created_at,
            confirmed_at: self.confirmed_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, booking_date, start_time, service_id, duration_minutes, kind, \
     status, client_name, client_email, client_phone, referral_code, final_price_cents, \
     payment_ref, created_at, confirmed_at";

fn client_fields(holder: &ReservationHolder) -> (Option<&str>, Option<&str>, Option<&str>) {
    match holder {
        ReservationHolder::Customer { name, email, phone } => {
            (Some(name.as_str()), Some(email.inner().as_str()), Some(phone.inner().as_str()))
        }
        ReservationHolder::AdminBlock => (None, None, None),
    }
}

async fn insert_row<'e, E>(executor: E, reservation: &Reservation) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let (client_name, client_email, client_phone) = client_fields(&reservation.holder);

    let result = sqlx::query(
        r#"
        INSERT INTO reservations
            (id, booking_date, start_time, service_id, duration_minutes, kind, status,
             client_name, client_email, client_phone, referral_code, final_price_cents,
             payment_ref, created_at, confirmed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (booking_date, start_time) DO NOTHING
        "#,
    )
    .bind(reservation.id)
    .bind(reservation.booking_date)
    .bind(reservation.start_time)
    .bind(reservation.service_id)
    .bind(reservation.duration_minutes as i32)
    .bind(reservation.holder.kind_str())
    .bind(reservation.status.as_str())
    .bind(client_name)
    .bind(client_email)
    .bind(client_phone)
    .bind(reservation.referral_code.as_deref())
    .bind(reservation.final_price_cents)
    .bind(reservation.payment_ref.as_deref())
    .bind(reservation.created_at)
    .bind(reservation.confirmed_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn confirmed_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM reservations \
             WHERE booking_date = $1 AND status = 'CONFIRMED' ORDER BY start_time"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReservationRow::into_domain).collect()
    }

    async fn find_at_slot(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Reservation>, StoreError> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM reservations \
             WHERE booking_date = $1 AND start_time = $2"
        ))
        .bind(date)
        .bind(time)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReservationRow::into_domain).transpose()
    }

    async fn insert_held(
        &self,
        reservation: &Reservation,
        expired_before: DateTime<Utc>,
    ) -> Result<HoldInsert, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lazy eviction: stale holds at this slot fall in the same
        // transaction as the insert that replaces them.
        sqlx::query(
            "DELETE FROM reservations \
             WHERE booking_date = $1 AND start_time = $2 AND status = 'HELD' AND created_at < $3",
        )
        .bind(reservation.booking_date)
        .bind(reservation.start_time)
        .bind(expired_before)
        .execute(&mut *tx)
        .await?;

        let inserted = insert_row(&mut *tx, reservation).await?;
        tx.commit().await?;

        Ok(if inserted == 1 {
            HoldInsert::Inserted
        } else {
            HoldInsert::SlotTaken
        })
    }

    async fn insert_confirmed(
        &self,
        reservation: &Reservation,
    ) -> Result<HoldInsert, StoreError> {
        let inserted = insert_row(&self.pool, reservation).await?;
        Ok(if inserted == 1 {
            HoldInsert::Inserted
        } else {
            HoldInsert::SlotTaken
        })
    }

    async fn confirm_held(
        &self,
        id: Uuid,
        final_price_cents: i64,
        payment_ref: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<ConfirmOutcome, StoreError> {
        // Single conditional update: of two racing confirmations exactly one
        // matches the HELD predicate.
        let promoted: Option<ReservationRow> = sqlx::query_as(&format!(
            "UPDATE reservations \
             SET status = 'CONFIRMED', final_price_cents = $2, payment_ref = $3, confirmed_at = $4 \
             WHERE id = $1 AND status = 'HELD' \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(id)
        .bind(final_price_cents)
        .bind(payment_ref)
        .bind(confirmed_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = promoted {
            return Ok(ConfirmOutcome::Confirmed(row.into_domain()?));
        }

        match self.get(id).await? {
            Some(existing) => Ok(ConfirmOutcome::AlreadyConfirmed(existing)),
            None => Ok(ConfirmOutcome::NotFound),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReservationRow::into_domain).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, date: Option<NaiveDate>) -> Result<Vec<Reservation>, StoreError> {
        let rows: Vec<ReservationRow> = match date {
            Some(date) => {
                sqlx::query_as(&format!(
                    "SELECT {SELECT_COLUMNS} FROM reservations \
                     WHERE booking_date = $1 ORDER BY booking_date DESC, start_time"
                ))
                .bind(date)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {SELECT_COLUMNS} FROM reservations \
                     ORDER BY booking_date DESC, start_time"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(ReservationRow::into_domain).collect()
    }

    async fn sales_by_referral(&self) -> Result<Vec<ReferralSales>, StoreError> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT referral_code, COUNT(*), COALESCE(SUM(final_price_cents), 0) \
             FROM reservations \
             WHERE status = 'CONFIRMED' AND kind = 'CUSTOMER' AND referral_code IS NOT NULL \
             GROUP BY referral_code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(code, usage_count, total_sales_cents)| ReferralSales {
                code,
                usage_count,
                total_sales_cents,
            })
            .collect())
    }
}
