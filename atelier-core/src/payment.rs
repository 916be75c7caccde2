use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Settlement state of a checkout session, as reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

/// Inputs for creating a hosted checkout session. The reservation id travels
/// in the session metadata so the confirmation callback can correlate the
/// payment back to the hold.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub reservation_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub product_name: String,
    pub description: String,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A freshly created hosted checkout session.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// A session as retrieved back from the gateway during confirmation.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub id: String,
    pub payment_status: PaymentStatus,
    pub amount_total_cents: i64,
    pub currency: Option<String>,
    /// Parsed from session metadata; absent when the session was not created
    /// through our checkout flow.
    pub reservation_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Request(String),

    #[error("gateway returned an unexpected response: {0}")]
    Malformed(String),

    #[error("checkout session not found: {0}")]
    NotFound(String),
}

/// External payment gateway boundary. Confirmation always calls
/// `retrieve_session` to re-verify paid status server-side; a client-supplied
/// "I paid" flag is never trusted.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<GatewaySession, GatewayError>;
}
