use std::sync::Arc;

use atelier_core::clock::Clock;
use atelier_core::errors::BlockError;
use atelier_core::repository::{HoldInsert, ReservationStore};
use atelier_core::reservation::Reservation;
use atelier_core::service::Service;
use atelier_schedule::AvailabilityEngine;
use chrono::{NaiveDate, NaiveTime};
use tracing::info;

use crate::rules::BookingRules;

/// Occupies slots without a customer (maintenance, closures). A block is an
/// ordinary confirmed reservation with the AdminBlock holder, so availability
/// and reporting treat it exactly like a real booking.
pub struct AdminSlotBlocker {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    rules: BookingRules,
}

impl AdminSlotBlocker {
    pub fn new(store: Arc<dyn ReservationStore>, clock: Arc<dyn Clock>, rules: BookingRules) -> Self {
        Self { store, clock, rules }
    }

    /// Block a slot for the duration of `service`. The confirmed-interval
    /// invariant holds for blocks too, so an overlap with any confirmed
    /// occupation refuses the block.
    pub async fn block(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        service: &Service,
    ) -> Result<Reservation, BlockError> {
        let confirmed = self.store.confirmed_for_date(date).await?;
        let occupied: Vec<(NaiveTime, u32)> = confirmed
            .iter()
            .map(|r| (r.start_time, r.duration_minutes))
            .collect();

        let engine = AvailabilityEngine::new(self.rules.buffer_minutes);
        if !engine.is_free(service.duration_minutes, time, &occupied) {
            return Err(BlockError::SlotOccupied { date, time });
        }

        let block = Reservation::admin_block(date, time, service, self.clock.now());
        match self.store.insert_confirmed(&block).await? {
            HoldInsert::Inserted => {
                info!("Slot {} {} blocked ({})", date, time, block.id);
                Ok(block)
            }
            HoldInsert::SlotTaken => Err(BlockError::SlotOccupied { date, time }),
        }
    }

    /// Remove a block, immediately freeing the slot. Customer bookings are
    /// not touchable through this path.
    pub async fn unblock(&self, id: uuid::Uuid) -> Result<Reservation, BlockError> {
        let reservation = self
            .store
            .get(id)
            .await?
            .ok_or(BlockError::NotFound(id))?;

        if !reservation.is_admin_block() {
            return Err(BlockError::NotAnAdminBlock(id));
        }

        self.store.delete(id).await?;
        info!(
            "Slot {} {} unblocked ({})",
            reservation.booking_date, reservation.start_time, id
        );
        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ReservationManager;
    use atelier_core::clock::ManualClock;
    use atelier_core::errors::ReserveError;
    use atelier_core::reservation::ReservationHolder;
    use atelier_shared::pii::Masked;
    use atelier_store::memory::MemoryReservationStore;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn service_minutes(duration: u32) -> Service {
        Service {
            id: Uuid::new_v4(),
            name: format!("Block {duration}m"),
            description: None,
            duration_minutes: duration,
            price_cents: 0,
            is_active: true,
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
    }

    fn fixture() -> (Arc<MemoryReservationStore>, AdminSlotBlocker, ReservationManager) {
        let store = Arc::new(MemoryReservationStore::new());
        let clock = Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        let blocker = AdminSlotBlocker::new(store.clone(), clock.clone(), BookingRules::default());
        let manager = ReservationManager::new(store.clone(), clock, BookingRules::default());
        (store, blocker, manager)
    }

    #[tokio::test]
    async fn block_occupies_the_interval_like_a_booking() {
        let (_store, blocker, manager) = fixture();

        // 30-minute block at 14:00 occupies [14:00, 14:35).
        blocker
            .block(date(), t(14, 0), &service_minutes(30))
            .await
            .unwrap();

        // A 15-minute package at 14:10 is unavailable.
        let short = service_minutes(15);
        let slots = manager.availability(&short, date()).await.unwrap();
        // 14:10 is off-grid; check via a direct reserve attempt as well.
        let denied = manager
            .reserve(
                date(),
                t(14, 10),
                &short,
                ReservationHolder::Customer {
                    name: "Aina".to_string(),
                    email: Masked("aina@example.com".to_string()),
                    phone: Masked("0123456789".to_string()),
                },
                None,
            )
            .await;
        assert!(matches!(
            denied,
            Err(ReserveError::SlotAlreadyConfirmed { .. })
        ));

        // The 14:00 and 14:20 grid slots are marked taken too.
        let verdict = |time: NaiveTime| {
            slots
                .iter()
                .find(|s| s.start == time)
                .map(|s| s.available)
                .unwrap()
        };
        assert!(!verdict(t(14, 0)));
        assert!(!verdict(t(14, 20)));
        assert!(verdict(t(14, 40)));
    }

    #[tokio::test]
    async fn unblock_frees_the_slot_immediately() {
        let (_store, blocker, manager) = fixture();
        let block = blocker
            .block(date(), t(14, 0), &service_minutes(30))
            .await
            .unwrap();

        blocker.unblock(block.id).await.unwrap();

        let slots = manager
            .availability(&service_minutes(15), date())
            .await
            .unwrap();
        assert!(slots.iter().find(|s| s.start == t(14, 0)).unwrap().available);
    }

    #[tokio::test]
    async fn blocking_an_occupied_slot_is_refused() {
        let (_store, blocker, _manager) = fixture();
        blocker
            .block(date(), t(14, 0), &service_minutes(30))
            .await
            .unwrap();

        let denied = blocker.block(date(), t(14, 10), &service_minutes(15)).await;
        assert!(matches!(denied, Err(BlockError::SlotOccupied { .. })));
    }

    #[tokio::test]
    async fn customer_bookings_cannot_be_unblocked() {
        let (store, blocker, manager) = fixture();
        let held = manager
            .reserve(
                date(),
                t(10, 0),
                &service_minutes(15),
                ReservationHolder::Customer {
                    name: "Aina".to_string(),
                    email: Masked("aina@example.com".to_string()),
                    phone: Masked("0123456789".to_string()),
                },
                None,
            )
            .await
            .unwrap();
        store
            .confirm_held(held.id, 6000, "cs_test", Utc::now())
            .await
            .unwrap();

        let denied = blocker.unblock(held.id).await;
        assert!(matches!(denied, Err(BlockError::NotAnAdminBlock(_))));
    }
}
