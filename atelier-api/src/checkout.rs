use axum::{extract::State, routing::post, Json, Router};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use atelier_core::payment::CheckoutRequest;
use atelier_core::referral::{apply_discount, normalize_code};
use atelier_core::reservation::ReservationHolder;
use atelier_shared::events::ReservationEvent;
use atelier_shared::pii::Masked;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ClientInfo {
    name: String,
    email: String,
    phone: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutBody {
    service_id: Uuid,
    date: NaiveDate,
    /// "HH:MM" as the booking page sends it; seconds tolerated.
    time: String,
    client: ClientInfo,
    referral_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct CheckoutResponse {
    reservation_id: Uuid,
    /// Hosted checkout redirect; the reservation id rides along in the
    /// gateway session metadata.
    url: String,
    expires_at: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/checkout", post(start_checkout))
}

pub(crate) fn parse_slot_time(value: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppError::ValidationError(format!("unparseable slot time: {value}")))
}

/// Hold the slot, then send the customer to the payment gateway. The hold is
/// released again if the gateway refuses to open a session, so a checkout
/// that never reached payment cannot occupy the slot for the full timeout.
async fn start_checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let service = state
        .catalog
        .get(&body.service_id)
        .ok_or_else(|| AppError::NotFoundError(format!("service {} not found", body.service_id)))?
        .clone();
    let time = parse_slot_time(&body.time)?;

    if body.client.name.trim().is_empty() || body.client.email.trim().is_empty() {
        return Err(AppError::ValidationError(
            "client name and email are required".to_string(),
        ));
    }

    let (referral_code, amount_cents) = match body.referral_code.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            let code = normalize_code(raw);
            let referral = state
                .referrals
                .get(&code)
                .await
                .map_err(|e| AppError::InternalServerError(e.to_string()))?
                .ok_or_else(|| AppError::ValidationError(format!("unknown referral code: {code}")))?;
            (
                Some(code),
                apply_discount(service.price_cents, referral.discount_percent),
            )
        }
        _ => (None, service.price_cents),
    };

    let holder = ReservationHolder::Customer {
        name: body.client.name.clone(),
        email: Masked(body.client.email.clone()),
        phone: Masked(body.client.phone.clone()),
    };

    let reservation = state
        .manager
        .reserve(body.date, time, &service, holder, referral_code)
        .await
        .map_err(AppError::from_reserve)?;

    let session = match state
        .gateway
        .create_checkout_session(&CheckoutRequest {
            reservation_id: reservation.id,
            amount_cents,
            currency: state.rules.currency.clone(),
            product_name: service.name.clone(),
            description: format!(
                "{} on {} at {} for {}",
                service.name, body.date, body.time, body.client.name
            ),
            customer_email: Some(body.client.email.clone()),
            success_url: state.urls.success.clone(),
            cancel_url: state.urls.cancel.clone(),
        })
        .await
    {
        Ok(session) => session,
        Err(e) => {
            // Roll the hold back; the customer was never given a way to pay.
            warn!(
                "Checkout session failed for reservation {}; releasing hold: {}",
                reservation.id, e
            );
            let _ = state.reservations.delete(reservation.id).await;
            return Err(AppError::InternalServerError(format!(
                "payment gateway unavailable: {e}"
            )));
        }
    };

    let expires_at = state.manager.hold_expires_at(reservation.created_at);
    state.emit(ReservationEvent::Held {
        reservation_id: reservation.id,
        booking_date: reservation.booking_date,
        start_time: reservation.start_time,
        service_id: reservation.service_id,
        expires_at: expires_at.timestamp(),
    });

    Ok(Json(CheckoutResponse {
        reservation_id: reservation.id,
        url: session.url,
        expires_at: expires_at.timestamp(),
    }))
}
