use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use atelier_schedule::SlotAvailability;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    service_id: Uuid,
    date: NaiveDate,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    service_id: Uuid,
    date: NaiveDate,
    slots: Vec<SlotAvailability>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/availability", get(get_availability))
}

/// The slot grid for a service on a date, marked against that date's
/// confirmed reservations. Computed fresh on every call.
async fn get_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let service = state
        .catalog
        .get(&query.service_id)
        .ok_or_else(|| AppError::NotFoundError(format!("service {} not found", query.service_id)))?;

    let slots = state
        .manager
        .availability(service, query.date)
        .await
        .map_err(AppError::from_reserve)?;

    Ok(Json(AvailabilityResponse {
        service_id: query.service_id,
        date: query.date,
        slots,
    }))
}
