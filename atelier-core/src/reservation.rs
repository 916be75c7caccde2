use atelier_shared::pii::Masked;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::service::Service;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Held,
    Confirmed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Held => "HELD",
            ReservationStatus::Confirmed => "CONFIRMED",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HELD" => Ok(ReservationStatus::Held),
            "CONFIRMED" => Ok(ReservationStatus::Confirmed),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

/// Who occupies the slot. An explicit discriminant: availability and
/// reporting logic branch on the variant, never on a sentinel customer name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationHolder {
    Customer {
        name: String,
        email: Masked<String>,
        phone: Masked<String>,
    },
    AdminBlock,
}

impl ReservationHolder {
    pub fn kind_str(&self) -> &'static str {
        match self {
            ReservationHolder::Customer { .. } => "CUSTOMER",
            ReservationHolder::AdminBlock => "ADMIN_BLOCK",
        }
    }
}

/// One held-or-confirmed occupation of a (date, start-time) slot. The slot
/// identity is unique in storage; the id correlates the row with the payment
/// gateway session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub service_id: Uuid,
    pub duration_minutes: u32,
    pub holder: ReservationHolder,
    pub status: ReservationStatus,
    pub referral_code: Option<String>,
    pub final_price_cents: Option<i64>,
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// New hold for a customer completing checkout.
    pub fn held(
        booking_date: NaiveDate,
        start_time: NaiveTime,
        service: &Service,
        holder: ReservationHolder,
        referral_code: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_date,
            start_time,
            service_id: service.id,
            duration_minutes: service.duration_minutes,
            holder,
            status: ReservationStatus::Held,
            referral_code,
            final_price_cents: None,
            payment_ref: None,
            created_at,
            confirmed_at: None,
        }
    }

    /// Administrative block: confirmed from birth, no payment step.
    pub fn admin_block(
        booking_date: NaiveDate,
        start_time: NaiveTime,
        service: &Service,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_date,
            start_time,
            service_id: service.id,
            duration_minutes: service.duration_minutes,
            holder: ReservationHolder::AdminBlock,
            status: ReservationStatus::Confirmed,
            referral_code: None,
            final_price_cents: None,
            payment_ref: None,
            created_at,
            confirmed_at: Some(created_at),
        }
    }

    pub fn is_admin_block(&self) -> bool {
        matches!(self.holder, ReservationHolder::AdminBlock)
    }

    /// Age-based expiry for held rows; confirmed rows never expire.
    pub fn hold_expired(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        self.status == ReservationStatus::Held && now - self.created_at >= timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_service() -> Service {
        Service {
            id: Uuid::new_v4(),
            name: "Small".to_string(),
            description: None,
            duration_minutes: 15,
            price_cents: 6000,
            is_active: true,
        }
    }

    fn customer() -> ReservationHolder {
        ReservationHolder::Customer {
            name: "Aina".to_string(),
            email: Masked("aina@example.com".to_string()),
            phone: Masked("0123456789".to_string()),
        }
    }

    #[test]
    fn hold_expiry_is_age_based() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 15, 50, 0).unwrap();
        let r = Reservation::held(
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            &sample_service(),
            customer(),
            None,
            t0,
        );

        let timeout = Duration::minutes(10);
        assert!(!r.hold_expired(t0 + Duration::minutes(5), timeout));
        assert!(r.hold_expired(t0 + Duration::minutes(11), timeout));
    }

    #[test]
    fn admin_blocks_are_confirmed_and_never_expire() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let block = Reservation::admin_block(
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            &sample_service(),
            t0,
        );

        assert_eq!(block.status, ReservationStatus::Confirmed);
        assert!(block.is_admin_block());
        assert!(!block.hold_expired(t0 + Duration::days(30), Duration::minutes(10)));
    }

    #[test]
    fn holder_serializes_with_kind_tag() {
        let json = serde_json::to_value(ReservationHolder::AdminBlock).unwrap();
        assert_eq!(json["kind"], "ADMIN_BLOCK");
    }
}
