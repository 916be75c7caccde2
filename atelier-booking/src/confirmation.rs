use std::sync::Arc;

use atelier_core::clock::Clock;
use atelier_core::errors::ConfirmError;
use atelier_core::payment::{PaymentGateway, PaymentStatus};
use atelier_core::repository::{ConfirmOutcome, ReservationStore};
use atelier_core::reservation::Reservation;
use tracing::{error, info, warn};

/// Result of a successful confirmation. `AlreadyConfirmed` is the idempotent
/// replay: the same gateway session arriving twice (redirect plus webhook,
/// or a refreshed success page) observes the booking it already secured.
#[derive(Debug, Clone)]
pub enum Confirmation {
    Confirmed(Reservation),
    AlreadyConfirmed(Reservation),
}

impl Confirmation {
    pub fn reservation(&self) -> &Reservation {
        match self {
            Confirmation::Confirmed(r) | Confirmation::AlreadyConfirmed(r) => r,
        }
    }
}

/// Promotes exactly one held reservation to confirmed per verified payment.
/// The promotion is a single conditional update keyed by reservation id;
/// everything that cannot be resolved that way is money-adjacent and gets
/// escalated, never swallowed.
pub struct ConfirmationHandler {
    store: Arc<dyn ReservationStore>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
}

impl ConfirmationHandler {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
        }
    }

    /// Confirm the reservation referenced by a checkout session. The paid
    /// status is re-verified with the gateway; the session id arriving from
    /// the success redirect proves nothing by itself.
    pub async fn confirm_checkout(&self, session_id: &str) -> Result<Confirmation, ConfirmError> {
        let session = self
            .gateway
            .retrieve_session(session_id)
            .await
            .map_err(|e| ConfirmError::Gateway(e.to_string()))?;

        if session.payment_status != PaymentStatus::Paid {
            warn!(
                "Confirmation attempted for session {} with status {:?}; leaving reservation untouched",
                session.id, session.payment_status
            );
            return Err(ConfirmError::PaymentNotVerified {
                session_id: session.id,
            });
        }

        let reservation_id = match session.reservation_id {
            Some(id) => id,
            None => {
                error!(
                    "Paid session {} carries no reservation reference; manual follow-up required",
                    session.id
                );
                return Err(ConfirmError::InvalidSession {
                    session_id: session.id,
                });
            }
        };

        match self
            .store
            .confirm_held(
                reservation_id,
                session.amount_total_cents,
                &session.id,
                self.clock.now(),
            )
            .await?
        {
            ConfirmOutcome::Confirmed(reservation) => {
                info!(
                    "Reservation {} confirmed for {} {} (payment {})",
                    reservation.id, reservation.booking_date, reservation.start_time, session.id
                );
                Ok(Confirmation::Confirmed(reservation))
            }
            ConfirmOutcome::AlreadyConfirmed(reservation)
                if reservation.payment_ref.as_deref() == Some(session.id.as_str()) =>
            {
                // Same payment, second delivery: success-equivalent.
                Ok(Confirmation::AlreadyConfirmed(reservation))
            }
            ConfirmOutcome::AlreadyConfirmed(other) => {
                // Two verified payments mapped to one slot: the double-sale
                // hazard. The losing payment needs a manual refund.
                error!(
                    "Payment {} verified but slot {} {} was already confirmed under payment {:?}; manual refund required",
                    session.id, other.booking_date, other.start_time, other.payment_ref
                );
                Err(ConfirmError::ReservationExpired {
                    reservation_id,
                    payment_ref: session.id,
                })
            }
            ConfirmOutcome::NotFound => {
                // The hold expired and was reclaimed (and possibly re-sold)
                // before this payment settled.
                error!(
                    "Payment {} verified but reservation {} no longer exists; manual refund required",
                    session.id, reservation_id
                );
                Err(ConfirmError::ReservationExpired {
                    reservation_id,
                    payment_ref: session.id,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ReservationManager;
    use crate::rules::BookingRules;
    use atelier_core::clock::ManualClock;
    use atelier_core::reservation::ReservationHolder;
    use atelier_core::service::Service;
    use atelier_shared::pii::Masked;
    use atelier_store::memory::MemoryReservationStore;
    use atelier_store::stripe::MockGateway;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use uuid::Uuid;

    fn service() -> Service {
        Service {
            id: Uuid::new_v4(),
            name: "Small".to_string(),
            description: None,
            duration_minutes: 15,
            price_cents: 6000,
            is_active: true,
        }
    }

    fn customer(name: &str) -> ReservationHolder {
        ReservationHolder::Customer {
            name: name.to_string(),
            email: Masked(format!("{}@example.com", name.to_lowercase())),
            phone: Masked("0123456789".to_string()),
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryReservationStore>,
        gateway: Arc<MockGateway>,
        clock: Arc<ManualClock>,
        manager: ReservationManager,
        handler: ConfirmationHandler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryReservationStore::new());
        let gateway = Arc::new(MockGateway::new());
        let clock = Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2024, 3, 1, 15, 50, 0).unwrap(),
        ));
        let manager = ReservationManager::new(
            store.clone(),
            clock.clone(),
            BookingRules::default(),
        );
        let handler =
            ConfirmationHandler::new(store.clone(), gateway.clone(), clock.clone());
        Fixture {
            store,
            gateway,
            clock,
            manager,
            handler,
        }
    }

    async fn hold_and_session(fx: &Fixture, name: &str) -> (Uuid, String) {
        let svc = service();
        let reservation = fx
            .manager
            .reserve(date(), t(16, 0), &svc, customer(name), None)
            .await
            .unwrap();
        let session = fx
            .gateway
            .create_checkout_session(&atelier_core::payment::CheckoutRequest {
                reservation_id: reservation.id,
                amount_cents: svc.price_cents,
                currency: "myr".to_string(),
                product_name: svc.name.clone(),
                description: String::new(),
                customer_email: None,
                success_url: "https://studio.test/success".to_string(),
                cancel_url: "https://studio.test/booking".to_string(),
            })
            .await
            .unwrap();
        (reservation.id, session.id)
    }

    #[tokio::test]
    async fn verified_payment_confirms_the_hold() {
        let fx = fixture();
        let (reservation_id, session_id) = hold_and_session(&fx, "Aina").await;
        fx.gateway.mark_paid(&session_id);

        let outcome = fx.handler.confirm_checkout(&session_id).await.unwrap();
        let reservation = outcome.reservation();
        assert_eq!(reservation.id, reservation_id);
        assert_eq!(
            reservation.status,
            atelier_core::reservation::ReservationStatus::Confirmed
        );
        assert_eq!(reservation.final_price_cents, Some(6000));
        assert_eq!(reservation.payment_ref.as_deref(), Some(session_id.as_str()));
    }

    #[tokio::test]
    async fn unpaid_session_leaves_the_reservation_untouched() {
        let fx = fixture();
        let (reservation_id, session_id) = hold_and_session(&fx, "Aina").await;

        let denied = fx.handler.confirm_checkout(&session_id).await;
        assert!(matches!(
            denied,
            Err(ConfirmError::PaymentNotVerified { .. })
        ));

        let stored = fx.store.get(reservation_id).await.unwrap().unwrap();
        assert_eq!(
            stored.status,
            atelier_core::reservation::ReservationStatus::Held
        );
    }

    #[tokio::test]
    async fn double_confirmation_is_idempotent() {
        let fx = fixture();
        let (_reservation_id, session_id) = hold_and_session(&fx, "Aina").await;
        fx.gateway.mark_paid(&session_id);

        let first = fx.handler.confirm_checkout(&session_id).await.unwrap();
        assert!(matches!(first, Confirmation::Confirmed(_)));

        let second = fx.handler.confirm_checkout(&session_id).await.unwrap();
        assert!(matches!(second, Confirmation::AlreadyConfirmed(_)));

        // Still a single confirmed row at the slot.
        let rows = fx.store.list(Some(date())).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn expired_and_resold_hold_escalates_for_reconciliation() {
        let fx = fixture();

        // Customer A holds and wanders off to pay.
        let (a_id, a_session) = hold_and_session(&fx, "Aina").await;

        // Hold times out; customer C reclaims the slot and pays first.
        fx.clock.advance(chrono::Duration::minutes(11));
        let (_c_id, c_session) = hold_and_session(&fx, "Chong").await;
        fx.gateway.mark_paid(&c_session);
        fx.handler.confirm_checkout(&c_session).await.unwrap();

        // A's payment settles afterwards: verified money, no securable slot.
        fx.gateway.mark_paid(&a_session);
        let escalated = fx.handler.confirm_checkout(&a_session).await;
        match escalated {
            Err(ConfirmError::ReservationExpired {
                reservation_id,
                payment_ref,
            }) => {
                assert_eq!(reservation_id, a_id);
                assert_eq!(payment_ref, a_session);
            }
            other => panic!("expected ReservationExpired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn session_without_reservation_reference_is_terminal() {
        let fx = fixture();
        fx.gateway.insert_paid_session("cs_orphan", 6000, None);

        let denied = fx.handler.confirm_checkout("cs_orphan").await;
        assert!(matches!(denied, Err(ConfirmError::InvalidSession { .. })));
    }
}
