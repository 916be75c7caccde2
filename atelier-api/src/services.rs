use axum::{extract::State, routing::get, Json, Router};

use atelier_core::service::Service;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/services", get(list_services))
}

/// The booking page's package picker: active services, cheapest first.
async fn list_services(State(state): State<AppState>) -> Result<Json<Vec<Service>>, AppError> {
    let services = state.catalog.list().into_iter().cloned().collect();
    Ok(Json(services))
}
