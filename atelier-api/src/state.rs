use std::sync::Arc;

use atelier_booking::{AdminSlotBlocker, BookingRules, ConfirmationHandler, ReservationManager};
use atelier_core::clock::Clock;
use atelier_core::payment::PaymentGateway;
use atelier_core::repository::{ReferralRepository, ReservationStore};
use atelier_core::service::ServiceCatalog;
use atelier_shared::events::ReservationEvent;
use atelier_store::{EventProducer, RedisClient};
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AuthSettings {
    pub secret: String,
    pub expiration_seconds: u64,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Clone)]
pub struct CheckoutUrls {
    pub success: String,
    pub cancel: String,
}

#[derive(Clone)]
pub struct AppState {
    pub reservations: Arc<dyn ReservationStore>,
    pub referrals: Arc<dyn ReferralRepository>,
    pub catalog: Arc<ServiceCatalog>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub manager: Arc<ReservationManager>,
    pub confirmations: Arc<ConfirmationHandler>,
    pub blocker: Arc<AdminSlotBlocker>,
    pub clock: Arc<dyn Clock>,
    pub redis: Arc<RedisClient>,
    pub kafka: Arc<EventProducer>,
    pub monitor_tx: broadcast::Sender<ReservationEvent>,
    pub auth: AuthSettings,
    pub rules: BookingRules,
    pub urls: CheckoutUrls,
}

impl AppState {
    /// Publish a lifecycle event to Kafka and fan it out to the admin
    /// monitor stream. Event delivery never fails or delays a request; the
    /// Kafka send happens off the request path.
    pub fn emit(&self, event: ReservationEvent) {
        let kafka = self.kafka.clone();
        let for_kafka = event.clone();
        tokio::spawn(async move {
            let _ = kafka.publish_reservation_event(&for_kafka).await;
        });
        let _ = self.monitor_tx.send(event);
    }
}
