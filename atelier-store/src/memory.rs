use async_trait::async_trait;
use atelier_core::referral::ReferralCode;
use atelier_core::repository::{
    ConfirmOutcome, HoldInsert, ReferralRepository, ReferralSales, ReservationStore,
    ServiceRepository, StoreError,
};
use atelier_core::reservation::{Reservation, ReservationHolder, ReservationStatus};
use atelier_core::service::Service;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// In-memory reservation store for tests and local development. Implements
/// the same conditional-insert and compare-and-swap contracts as the
/// Postgres store, with the mutex standing in for the unique constraint, so
/// race behavior is testable without a database.
#[derive(Default)]
pub struct MemoryReservationStore {
    inner: Mutex<HashMap<Uuid, Reservation>>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_occupant(
        rows: &HashMap<Uuid, Reservation>,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Option<Uuid> {
        rows.values()
            .find(|r| r.booking_date == date && r.start_time == time)
            .map(|r| r.id)
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn confirmed_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = self.inner.lock().expect("store poisoned");
        let mut confirmed: Vec<Reservation> = rows
            .values()
            .filter(|r| r.booking_date == date && r.status == ReservationStatus::Confirmed)
            .cloned()
            .collect();
        confirmed.sort_by_key(|r| r.start_time);
        Ok(confirmed)
    }

    async fn find_at_slot(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Reservation>, StoreError> {
        let rows = self.inner.lock().expect("store poisoned");
        Ok(rows
            .values()
            .find(|r| r.booking_date == date && r.start_time == time)
            .cloned())
    }

    async fn insert_held(
        &self,
        reservation: &Reservation,
        expired_before: DateTime<Utc>,
    ) -> Result<HoldInsert, StoreError> {
        let mut rows = self.inner.lock().expect("store poisoned");

        // Evict stale holds at this slot, then insert only if it is empty --
        // one critical section, like the Postgres transaction.
        rows.retain(|_, r| {
            !(r.booking_date == reservation.booking_date
                && r.start_time == reservation.start_time
                && r.status == ReservationStatus::Held
                && r.created_at < expired_before)
        });

        if Self::slot_occupant(&rows, reservation.booking_date, reservation.start_time).is_some() {
            return Ok(HoldInsert::SlotTaken);
        }

        rows.insert(reservation.id, reservation.clone());
        Ok(HoldInsert::Inserted)
    }

    async fn insert_confirmed(
        &self,
        reservation: &Reservation,
    ) -> Result<HoldInsert, StoreError> {
        let mut rows = self.inner.lock().expect("store poisoned");
        if Self::slot_occupant(&rows, reservation.booking_date, reservation.start_time).is_some() {
            return Ok(HoldInsert::SlotTaken);
        }
        rows.insert(reservation.id, reservation.clone());
        Ok(HoldInsert::Inserted)
    }

    async fn confirm_held(
        &self,
        id: Uuid,
        final_price_cents: i64,
        payment_ref: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<ConfirmOutcome, StoreError> {
        let mut rows = self.inner.lock().expect("store poisoned");
        match rows.get_mut(&id) {
            None => Ok(ConfirmOutcome::NotFound),
            Some(r) if r.status == ReservationStatus::Confirmed => {
                Ok(ConfirmOutcome::AlreadyConfirmed(r.clone()))
            }
            Some(r) => {
                r.status = ReservationStatus::Confirmed;
                r.final_price_cents = Some(final_price_cents);
                r.payment_ref = Some(payment_ref.to_string());
                r.confirmed_at = Some(confirmed_at);
                Ok(ConfirmOutcome::Confirmed(r.clone()))
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let rows = self.inner.lock().expect("store poisoned");
        Ok(rows.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut rows = self.inner.lock().expect("store poisoned");
        Ok(rows.remove(&id).is_some())
    }

    async fn list(&self, date: Option<NaiveDate>) -> Result<Vec<Reservation>, StoreError> {
        let rows = self.inner.lock().expect("store poisoned");
        let mut listed: Vec<Reservation> = rows
            .values()
            .filter(|r| date.map_or(true, |d| r.booking_date == d))
            .cloned()
            .collect();
        listed.sort_by(|a, b| {
            b.booking_date
                .cmp(&a.booking_date)
                .then(a.start_time.cmp(&b.start_time))
        });
        Ok(listed)
    }

    async fn sales_by_referral(&self) -> Result<Vec<ReferralSales>, StoreError> {
        let rows = self.inner.lock().expect("store poisoned");
        let mut by_code: HashMap<String, (i64, i64)> = HashMap::new();

        for r in rows.values() {
            if r.status != ReservationStatus::Confirmed {
                continue;
            }
            if !matches!(r.holder, ReservationHolder::Customer { .. }) {
                continue;
            }
            if let Some(code) = &r.referral_code {
                let entry = by_code.entry(code.clone()).or_default();
                entry.0 += 1;
                entry.1 += r.final_price_cents.unwrap_or(0);
            }
        }

        let mut sales: Vec<ReferralSales> = by_code
            .into_iter()
            .map(|(code, (usage_count, total_sales_cents))| ReferralSales {
                code,
                usage_count,
                total_sales_cents,
            })
            .collect();
        sales.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(sales)
    }
}

/// Fixed service list for tests.
pub struct MemoryServiceRepository {
    services: Vec<Service>,
}

impl MemoryServiceRepository {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ServiceRepository for MemoryServiceRepository {
    async fn list_active(&self) -> Result<Vec<Service>, StoreError> {
        let mut active: Vec<Service> = self
            .services
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|s| s.price_cents);
        Ok(active)
    }
}

/// Mutable referral-code table for tests.
#[derive(Default)]
pub struct MemoryReferralRepository {
    codes: Mutex<HashMap<String, ReferralCode>>,
}

impl MemoryReferralRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReferralRepository for MemoryReferralRepository {
    async fn get(&self, code: &str) -> Result<Option<ReferralCode>, StoreError> {
        let codes = self.codes.lock().expect("store poisoned");
        Ok(codes.get(code).cloned())
    }

    async fn list(&self) -> Result<Vec<ReferralCode>, StoreError> {
        let codes = self.codes.lock().expect("store poisoned");
        let mut listed: Vec<ReferralCode> = codes.values().cloned().collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(listed)
    }

    async fn create(&self, referral: &ReferralCode) -> Result<(), StoreError> {
        let mut codes = self.codes.lock().expect("store poisoned");
        if codes.contains_key(&referral.code) {
            return Err(format!("referral code already exists: {}", referral.code).into());
        }
        codes.insert(referral.code.clone(), referral.clone());
        Ok(())
    }

    async fn delete(&self, code: &str) -> Result<bool, StoreError> {
        let mut codes = self.codes.lock().expect("store poisoned");
        Ok(codes.remove(code).is_some())
    }
}
