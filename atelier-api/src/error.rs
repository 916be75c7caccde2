use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use atelier_core::errors::{BlockError, ConfirmError, ReserveError};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    /// Slot conflicts carry a machine-readable code so the booking page can
    /// guide the customer ("pick another slot" / "try again in N minutes").
    Conflict {
        code: &'static str,
        message: String,
    },
    /// Payment exists but is not verified as paid; surfaced as "payment
    /// incomplete", never as a technical error.
    PaymentIncomplete(String),
    /// Money moved but no slot was secured; honest contact-support response.
    ReconciliationRequired(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "unauthenticated", msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            AppError::PaymentIncomplete(msg) => (StatusCode::PAYMENT_REQUIRED, "payment_incomplete", msg),
            AppError::ReconciliationRequired(msg) => {
                (StatusCode::CONFLICT, "reconciliation_required", msg)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}

impl AppError {
    /// Slot conflicts map to 409 with per-variant codes. `RaceLost` is the
    /// uniqueness rejection and reads exactly like an already-confirmed slot
    /// from the caller's side.
    pub fn from_reserve(err: ReserveError) -> Self {
        match err {
            ReserveError::SlotAlreadyConfirmed { .. } => AppError::Conflict {
                code: "slot_already_confirmed",
                message: err.to_string(),
            },
            ReserveError::SlotHeldByOther { .. } => AppError::Conflict {
                code: "slot_held",
                message: err.to_string(),
            },
            ReserveError::RaceLost { .. } => AppError::Conflict {
                code: "slot_already_confirmed",
                message: err.to_string(),
            },
            ReserveError::Storage(e) => AppError::InternalServerError(e.to_string()),
        }
    }

    pub fn from_confirm(err: ConfirmError) -> Self {
        match err {
            ConfirmError::PaymentNotVerified { .. } => {
                AppError::PaymentIncomplete("Payment is not complete yet.".to_string())
            }
            ConfirmError::InvalidSession { .. } | ConfirmError::ReservationExpired { .. } => {
                AppError::ReconciliationRequired(
                    "Payment received but the slot could not be secured. Please contact support."
                        .to_string(),
                )
            }
            ConfirmError::Gateway(msg) => AppError::InternalServerError(msg),
            ConfirmError::Storage(e) => AppError::InternalServerError(e.to_string()),
        }
    }

    pub fn from_block(err: BlockError) -> Self {
        match err {
            BlockError::SlotOccupied { .. } => AppError::Conflict {
                code: "slot_occupied",
                message: err.to_string(),
            },
            BlockError::NotFound(id) => AppError::NotFoundError(format!("reservation {id} not found")),
            BlockError::NotAnAdminBlock(_) => AppError::ValidationError(err.to_string()),
            BlockError::Storage(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}
