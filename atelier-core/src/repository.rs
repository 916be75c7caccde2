use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::referral::ReferralCode;
use crate::reservation::Reservation;
use crate::service::Service;

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a conditional slot insert. `SlotTaken` is the storage-level
/// uniqueness rejection on (booking_date, start_time) — the primary conflict
/// signal; any pre-check read is only an optimization for a friendlier error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldInsert {
    Inserted,
    SlotTaken,
}

/// Outcome of the conditional Held -> Confirmed promotion.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    Confirmed(Reservation),
    AlreadyConfirmed(Reservation),
    NotFound,
}

/// Shared store of reservations. All coordination between stateless request
/// handlers goes through these operations; there is no in-process shared
/// state.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Confirmed reservations (customer bookings and admin blocks) for a date.
    async fn confirmed_for_date(&self, date: NaiveDate)
        -> Result<Vec<Reservation>, StoreError>;

    /// Exact (date, start-time) lookup, any status.
    async fn find_at_slot(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Reservation>, StoreError>;

    /// Conditionally insert a held reservation. Held rows at the same slot
    /// created before `expired_before` are deleted first; eviction and insert
    /// run in one storage transaction. Returns `SlotTaken` when a live row
    /// still occupies the slot.
    async fn insert_held(
        &self,
        reservation: &Reservation,
        expired_before: DateTime<Utc>,
    ) -> Result<HoldInsert, StoreError>;

    /// Conditionally insert a reservation that is confirmed from birth
    /// (admin blocks). No eviction: an occupied slot refuses the insert.
    async fn insert_confirmed(&self, reservation: &Reservation)
        -> Result<HoldInsert, StoreError>;

    /// Atomically promote a held reservation to confirmed, recording the
    /// final price and payment reference. A single conditional update keyed
    /// by id: of two racing confirmations exactly one observes `Confirmed`,
    /// the other `AlreadyConfirmed`.
    async fn confirm_held(
        &self,
        id: Uuid,
        final_price_cents: i64,
        payment_ref: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<ConfirmOutcome, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, StoreError>;

    /// Remove a reservation; the slot becomes bookable on the next query.
    /// Returns false when no row existed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// All reservations, optionally filtered to one date, ordered by date
    /// then start time.
    async fn list(&self, date: Option<NaiveDate>) -> Result<Vec<Reservation>, StoreError>;

    /// Per-referral-code (usage count, sales total) over confirmed customer
    /// bookings; the read side of the commission report.
    async fn sales_by_referral(&self) -> Result<Vec<ReferralSales>, StoreError>;
}

/// Aggregated confirmed sales for one referral code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralSales {
    pub code: String,
    pub usage_count: i64,
    pub total_sales_cents: i64,
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Service>, StoreError>;
}

#[async_trait]
pub trait ReferralRepository: Send + Sync {
    async fn get(&self, code: &str) -> Result<Option<ReferralCode>, StoreError>;

    async fn list(&self) -> Result<Vec<ReferralCode>, StoreError>;

    async fn create(&self, referral: &ReferralCode) -> Result<(), StoreError>;

    /// Returns false when no such code existed.
    async fn delete(&self, code: &str) -> Result<bool, StoreError>;
}
