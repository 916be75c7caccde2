use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use atelier_core::referral::{normalize_code, CommissionLine, ReferralCode};
use atelier_core::reservation::Reservation;
use atelier_shared::events::ReservationEvent;

use crate::checkout::parse_slot_time;
use crate::error::AppError;
use crate::monitor;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/blocks", post(create_block))
        .route("/v1/admin/blocks/{id}", delete(remove_block))
        .route("/v1/admin/reservations", get(list_reservations))
        .route("/v1/admin/reservations/{id}", delete(cancel_reservation))
        .route(
            "/v1/admin/referrals",
            get(list_referrals).post(create_referral),
        )
        .route("/v1/admin/referrals/{code}", delete(delete_referral))
        .route("/v1/admin/referrals/commission", get(commission_report))
        .route("/v1/admin/monitor/stream", get(monitor::monitor_stream))
}

// ============================================================================
// Slot blocks
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateBlockRequest {
    date: NaiveDate,
    time: String,
    /// The service whose duration the block occupies.
    service_id: Uuid,
}

/// POST /v1/admin/blocks
async fn create_block(
    State(state): State<AppState>,
    Json(req): Json<CreateBlockRequest>,
) -> Result<Json<Reservation>, AppError> {
    let service = state
        .catalog
        .get(&req.service_id)
        .ok_or_else(|| AppError::NotFoundError(format!("service {} not found", req.service_id)))?
        .clone();
    let time = parse_slot_time(&req.time)?;

    let block = state
        .blocker
        .block(req.date, time, &service)
        .await
        .map_err(AppError::from_block)?;

    state.emit(ReservationEvent::Blocked {
        reservation_id: block.id,
        booking_date: block.booking_date,
        start_time: block.start_time,
    });

    Ok(Json(block))
}

/// DELETE /v1/admin/blocks/{id}
async fn remove_block(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let removed = state.blocker.unblock(id).await.map_err(AppError::from_block)?;

    state.emit(ReservationEvent::Unblocked {
        reservation_id: removed.id,
        booking_date: removed.booking_date,
        start_time: removed.start_time,
    });

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Reservation list / cancellation
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListReservationsQuery {
    date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct AdminReservation {
    #[serde(flatten)]
    reservation: Reservation,
    /// Expiry is evaluated lazily; a stale hold can linger until the slot is
    /// next contested. Annotate it so the dashboard shows which holds are
    /// already dead.
    hold_expired: bool,
}

/// GET /v1/admin/reservations[?date]
async fn list_reservations(
    State(state): State<AppState>,
    Query(query): Query<ListReservationsQuery>,
) -> Result<Json<Vec<AdminReservation>>, AppError> {
    let reservations = state
        .reservations
        .list(query.date)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let now = state.clock.now();
    let timeout = state.rules.hold_timeout();
    Ok(Json(
        reservations
            .into_iter()
            .map(|reservation| AdminReservation {
                hold_expired: reservation.hold_expired(now, timeout),
                reservation,
            })
            .collect(),
    ))
}

/// DELETE /v1/admin/reservations/{id} — cancel any reservation, freeing the
/// slot for the next availability query.
async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let reservation = state
        .reservations
        .get(id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("reservation {id} not found")))?;

    state
        .reservations
        .delete(id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    state.emit(ReservationEvent::Released {
        reservation_id: reservation.id,
        booking_date: reservation.booking_date,
        start_time: reservation.start_time,
    });

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Referral codes and the commission report
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateReferralRequest {
    code: String,
    staff_name: String,
    discount_percent: i32,
}

async fn list_referrals(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReferralCode>>, AppError> {
    let codes = state
        .referrals
        .list()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(codes))
}

async fn create_referral(
    State(state): State<AppState>,
    Json(req): Json<CreateReferralRequest>,
) -> Result<Json<ReferralCode>, AppError> {
    let code = normalize_code(&req.code);
    if code.is_empty() {
        return Err(AppError::ValidationError("referral code is required".to_string()));
    }
    if !(1..=100).contains(&req.discount_percent) {
        return Err(AppError::ValidationError(
            "discount_percent must be between 1 and 100".to_string(),
        ));
    }

    let referral = ReferralCode {
        code,
        staff_name: req.staff_name,
        discount_percent: req.discount_percent,
        created_at: state.clock.now(),
    };

    state
        .referrals
        .create(&referral)
        .await
        .map_err(|e| AppError::Conflict {
            code: "referral_exists",
            message: e.to_string(),
        })?;

    Ok(Json(referral))
}

async fn delete_referral(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    let code = normalize_code(&code);
    let deleted = state
        .referrals
        .delete(&code)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    if !deleted {
        return Err(AppError::NotFoundError(format!("referral code {code} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/admin/referrals/commission — per-code usage, sales, and the staff
/// commission over confirmed customer bookings. Codes with no sales yet show
/// zero lines rather than disappearing.
async fn commission_report(
    State(state): State<AppState>,
) -> Result<Json<Vec<CommissionLine>>, AppError> {
    let codes = state
        .referrals
        .list()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let sales = state
        .reservations
        .sales_by_referral()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let by_code: HashMap<&str, (i64, i64)> = sales
        .iter()
        .map(|s| (s.code.as_str(), (s.usage_count, s.total_sales_cents)))
        .collect();

    let report = codes
        .iter()
        .map(|referral| {
            let (usage_count, total_sales_cents) = by_code
                .get(referral.code.as_str())
                .copied()
                .unwrap_or((0, 0));
            CommissionLine::compute(referral, usage_count, total_sales_cents)
        })
        .collect();

    Ok(Json(report))
}
