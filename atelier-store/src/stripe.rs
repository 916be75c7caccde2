use async_trait::async_trait;
use atelier_core::payment::{
    CheckoutRequest, CheckoutSession, GatewayError, GatewaySession, PaymentGateway, PaymentStatus,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Stripe Checkout adapter. Creates hosted checkout sessions with the
/// reservation id in the session metadata and retrieves them back during
/// confirmation. The API speaks form-encoded requests with bracketed keys.
pub struct StripeCheckout {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl StripeCheckout {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: "https://api.stripe.com".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the adapter at a stub server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct StripeSessionBody {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
    amount_total: Option<i64>,
    currency: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

fn parse_payment_status(value: &str) -> PaymentStatus {
    match value {
        "paid" => PaymentStatus::Paid,
        "no_payment_required" => PaymentStatus::NoPaymentRequired,
        _ => PaymentStatus::Unpaid,
    }
}

#[async_trait]
impl PaymentGateway for StripeCheckout {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let amount = request.amount_cents.to_string();
        let reservation_id = request.reservation_id.to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("payment_method_types[0]", "card"),
            ("payment_method_types[1]", "fpx"),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", &request.currency),
            ("line_items[0][price_data][unit_amount]", &amount),
            (
                "line_items[0][price_data][product_data][name]",
                &request.product_name,
            ),
            (
                "line_items[0][price_data][product_data][description]",
                &request.description,
            ),
            ("metadata[reservation_id]", &reservation_id),
            ("success_url", &request.success_url),
            ("cancel_url", &request.cancel_url),
        ];
        if let Some(email) = &request.customer_email {
            params.push(("customer_email", email));
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Request(format!(
                "checkout session create returned {status}: {body}"
            )));
        }

        let body: StripeSessionBody = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        let url = body
            .url
            .ok_or_else(|| GatewayError::Malformed("session without redirect url".to_string()))?;

        Ok(CheckoutSession { id: body.id, url })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<GatewaySession, GatewayError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.api_base, session_id
            ))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(session_id.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(GatewayError::Request(format!(
                "session retrieve returned {status}"
            )));
        }

        let body: StripeSessionBody = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        let payment_status = body
            .payment_status
            .as_deref()
            .map(parse_payment_status)
            .ok_or_else(|| {
                GatewayError::Malformed("session without payment_status".to_string())
            })?;

        Ok(GatewaySession {
            id: body.id,
            payment_status,
            amount_total_cents: body.amount_total.unwrap_or(0),
            currency: body.currency,
            reservation_id: body
                .metadata
                .get("reservation_id")
                .and_then(|v| Uuid::parse_str(v).ok()),
        })
    }
}

/// Configurable gateway double for tests and local development: sessions are
/// created unpaid and flipped with `mark_paid`, simulating the customer
/// finishing the hosted checkout out-of-band.
#[derive(Default)]
pub struct MockGateway {
    inner: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    sessions: HashMap<String, GatewaySession>,
    counter: u64,
    fail_next_create: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a session to paid, as the gateway would after settlement.
    pub fn mark_paid(&self, session_id: &str) {
        let mut state = self.inner.lock().expect("gateway poisoned");
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.payment_status = PaymentStatus::Paid;
        }
    }

    /// Seed an already-paid session, optionally without a reservation
    /// reference (a session not created through our checkout flow).
    pub fn insert_paid_session(
        &self,
        session_id: &str,
        amount_total_cents: i64,
        reservation_id: Option<Uuid>,
    ) {
        let mut state = self.inner.lock().expect("gateway poisoned");
        state.sessions.insert(
            session_id.to_string(),
            GatewaySession {
                id: session_id.to_string(),
                payment_status: PaymentStatus::Paid,
                amount_total_cents,
                currency: Some("myr".to_string()),
                reservation_id,
            },
        );
    }

    /// Make the next create call fail, for checkout-rollback tests.
    pub fn fail_next_create(&self) {
        self.inner.lock().expect("gateway poisoned").fail_next_create = true;
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut state = self.inner.lock().expect("gateway poisoned");
        if state.fail_next_create {
            state.fail_next_create = false;
            return Err(GatewayError::Request("injected failure".to_string()));
        }

        state.counter += 1;
        let id = format!("cs_test_{}", state.counter);
        state.sessions.insert(
            id.clone(),
            GatewaySession {
                id: id.clone(),
                payment_status: PaymentStatus::Unpaid,
                amount_total_cents: request.amount_cents,
                currency: Some(request.currency.clone()),
                reservation_id: Some(request.reservation_id),
            },
        );

        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/{id}"),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<GatewaySession, GatewayError> {
        let state = self.inner.lock().expect("gateway poisoned");
        state
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(session_id.to_string()))
    }
}
