use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::repository::StoreError;

/// Failures of `ReservationManager::reserve`. All slot conflicts are
/// recoverable for the customer (pick another slot); they are surfaced at
/// the checkout boundary and never retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum ReserveError {
    #[error("slot {date} {time} already has a confirmed booking")]
    SlotAlreadyConfirmed { date: NaiveDate, time: NaiveTime },

    #[error("slot {date} {time} is held by another customer; try again in {retry_after_minutes} minutes")]
    SlotHeldByOther {
        date: NaiveDate,
        time: NaiveTime,
        retry_after_minutes: i64,
    },

    /// The storage-level uniqueness rejection: another writer inserted the
    /// slot between our pre-check and our insert. Callers treat this exactly
    /// like `SlotAlreadyConfirmed`.
    #[error("lost the race for slot {date} {time}")]
    RaceLost { date: NaiveDate, time: NaiveTime },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Failures of `ConfirmationHandler::confirm_checkout`. The expired and
/// invalid-session variants are terminal: money may have moved without a
/// slot being secured, so they are logged with the full payment reference
/// and escalated for manual reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ConfirmError {
    #[error("payment for session {session_id} is not verified as paid")]
    PaymentNotVerified { session_id: String },

    #[error("checkout session {session_id} carries no usable reservation reference")]
    InvalidSession { session_id: String },

    #[error("reservation {reservation_id} could not be secured for payment {payment_ref}; manual reconciliation required")]
    ReservationExpired {
        reservation_id: Uuid,
        payment_ref: String,
    },

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Failures of the admin slot blocker.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("slot {date} {time} is already occupied")]
    SlotOccupied { date: NaiveDate, time: NaiveTime },

    #[error("reservation {0} not found")]
    NotFound(Uuid),

    #[error("reservation {0} is a customer booking, not an admin block")]
    NotAnAdminBlock(Uuid),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}
