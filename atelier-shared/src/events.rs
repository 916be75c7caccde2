use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

/// Reservation lifecycle events, published to Kafka and fanned out to the
/// admin monitor stream. One enum rather than one struct per topic so a
/// single broadcast channel carries the whole lifecycle.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReservationEvent {
    Held {
        reservation_id: Uuid,
        booking_date: NaiveDate,
        start_time: NaiveTime,
        service_id: Uuid,
        expires_at: i64,
    },
    Confirmed {
        reservation_id: Uuid,
        booking_date: NaiveDate,
        start_time: NaiveTime,
        final_price_cents: i64,
        payment_ref: String,
    },
    /// A hold or booking was removed and the slot is bookable again.
    Released {
        reservation_id: Uuid,
        booking_date: NaiveDate,
        start_time: NaiveTime,
    },
    Blocked {
        reservation_id: Uuid,
        booking_date: NaiveDate,
        start_time: NaiveTime,
    },
    Unblocked {
        reservation_id: Uuid,
        booking_date: NaiveDate,
        start_time: NaiveTime,
    },
    /// A verified payment could not be matched to a securable reservation.
    /// Requires manual follow-up; never dropped.
    Reconciliation {
        payment_ref: String,
        reservation_id: Option<Uuid>,
        reason: String,
    },
}

impl ReservationEvent {
    /// Kafka topic for this event.
    pub fn topic(&self) -> &'static str {
        match self {
            ReservationEvent::Held { .. } => "reservation.held",
            ReservationEvent::Confirmed { .. } => "reservation.confirmed",
            ReservationEvent::Released { .. } => "reservation.released",
            ReservationEvent::Blocked { .. } | ReservationEvent::Unblocked { .. } => {
                "reservation.blocked"
            }
            ReservationEvent::Reconciliation { .. } => "reservation.reconciliation",
        }
    }

    /// Partition key: the reservation id where one exists, otherwise the
    /// payment reference.
    pub fn key(&self) -> String {
        match self {
            ReservationEvent::Held { reservation_id, .. }
            | ReservationEvent::Confirmed { reservation_id, .. }
            | ReservationEvent::Released { reservation_id, .. }
            | ReservationEvent::Blocked { reservation_id, .. }
            | ReservationEvent::Unblocked { reservation_id, .. } => reservation_id.to_string(),
            ReservationEvent::Reconciliation {
                reservation_id,
                payment_ref,
                ..
            } => reservation_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| payment_ref.clone()),
        }
    }
}
