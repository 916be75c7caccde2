use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use atelier_booking::Confirmation;
use atelier_core::errors::ConfirmError;
use atelier_core::reservation::Reservation;
use atelier_shared::events::ReservationEvent;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ConfirmBody {
    /// The gateway session id from the success redirect. Paid status is
    /// re-verified with the gateway; the id alone proves nothing.
    session_id: String,
}

#[derive(Debug, Serialize)]
struct ConfirmResponse {
    status: &'static str,
    booking: Reservation,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/bookings/confirm", post(confirm_booking))
}

async fn confirm_booking(
    State(state): State<AppState>,
    Json(body): Json<ConfirmBody>,
) -> Result<Json<ConfirmResponse>, AppError> {
    if body.session_id.trim().is_empty() {
        return Err(AppError::ValidationError("session_id is required".to_string()));
    }

    match state.confirmations.confirm_checkout(&body.session_id).await {
        Ok(Confirmation::Confirmed(booking)) => {
            state.emit(ReservationEvent::Confirmed {
                reservation_id: booking.id,
                booking_date: booking.booking_date,
                start_time: booking.start_time,
                final_price_cents: booking.final_price_cents.unwrap_or(0),
                payment_ref: booking.payment_ref.clone().unwrap_or_default(),
            });
            Ok(Json(ConfirmResponse {
                status: "confirmed",
                booking,
            }))
        }
        // Replay of a settled session: success-equivalent, no second event.
        Ok(Confirmation::AlreadyConfirmed(booking)) => Ok(Json(ConfirmResponse {
            status: "confirmed",
            booking,
        })),
        Err(err) => {
            // Money-adjacent failures leave an event trail for manual
            // reconciliation before the caller sees the error.
            match &err {
                ConfirmError::ReservationExpired {
                    reservation_id,
                    payment_ref,
                } => {
                    state.emit(ReservationEvent::Reconciliation {
                        payment_ref: payment_ref.clone(),
                        reservation_id: Some(*reservation_id),
                        reason: "verified payment but the slot could not be secured".to_string(),
                    });
                }
                ConfirmError::InvalidSession { session_id } => {
                    state.emit(ReservationEvent::Reconciliation {
                        payment_ref: session_id.clone(),
                        reservation_id: None,
                        reason: "paid session without a reservation reference".to_string(),
                    });
                }
                _ => {}
            }
            Err(AppError::from_confirm(err))
        }
    }
}
