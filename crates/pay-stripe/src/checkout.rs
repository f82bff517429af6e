//! # Stripe Checkout Sessions
//!
//! Implementation of the Stripe Checkout Sessions API: creating a hosted
//! payment session and retrieving its current state.

use crate::config::StripeConfig;
use crate::webhook;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pay_core::{
    money, CheckoutRequest, CheckoutSession, CustomerDetails, PaymentDetails, PaymentError,
    PaymentGateway, PaymentResult, SessionSummary, WebhookEvent,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Unpaid sessions expire after this long
pub const SESSION_TTL_MINUTES: i64 = 30;

/// Shortest id accepted before asking Stripe about it
const MIN_SESSION_ID_LEN: usize = 10;

/// Nested objects expanded when retrieving a session
const SESSION_EXPANSIONS: &[&str] = &[
    "payment_intent",
    "payment_intent.latest_charge",
    "line_items",
];

/// Stripe Checkout gateway
///
/// Uses Stripe's hosted checkout page; card data never touches this service.
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                PaymentError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        let config = StripeConfig::from_env()?;
        Self::new(config)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Form body for `POST /v1/checkout/sessions`
    fn checkout_form(request: &CheckoutRequest, expires_at: i64) -> Vec<(String, String)> {
        let order = &request.order;

        let mut form_params: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("expires_at".to_string(), expires_at.to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                money::CURRENCY.to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                order.amount_minor.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                format!("{} payment", order.server_provider),
            ),
            (
                "line_items[0][price_data][product_data][description]".to_string(),
                format!("Payment for {} on {}", order.username, order.server_provider),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];

        for (key, value) in request.metadata() {
            form_params.push((format!("metadata[{}]", key), value));
        }

        form_params
    }

    /// Turn a non-2xx Stripe response into a typed error
    fn api_error(status: StatusCode, body: &str, session_id: Option<&str>) -> PaymentError {
        let parsed = serde_json::from_str::<StripeErrorResponse>(body).ok();

        if let Some(session_id) = session_id {
            let missing = parsed
                .as_ref()
                .and_then(|e| e.error.code.as_deref())
                .map(|code| code == "resource_missing")
                .unwrap_or(false);
            if status == StatusCode::NOT_FOUND || missing {
                return PaymentError::SessionNotFound {
                    session_id: session_id.to_string(),
                };
            }
        }

        let message = match parsed {
            Some(e) => e.error.message,
            None => format!("HTTP {}: {}", status, body),
        };

        PaymentError::ProviderError {
            provider: PROVIDER.to_string(),
            message,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    async fn create_checkout(&self, request: &CheckoutRequest) -> PaymentResult<CheckoutSession> {
        let expires_at = (Utc::now() + Duration::minutes(SESSION_TTL_MINUTES)).timestamp();
        let form_params = Self::checkout_form(request, expires_at);

        debug!(
            "Creating Stripe checkout session: amount={}, provider={}",
            request.order.amount_minor, request.order.server_provider
        );

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form_params)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);
            return Err(Self::api_error(status, &body, None));
        }

        let session: StripeCheckoutSessionResponse = serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;

        let checkout_url = session.url.ok_or_else(|| PaymentError::ProviderError {
            provider: PROVIDER.to_string(),
            message: format!("Session {} has no redirect URL", session.id),
        })?;

        info!("Created Stripe checkout session: id={}", session.id);

        Ok(CheckoutSession {
            session_id: session.id,
            checkout_url,
            expires_at: session
                .expires_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> PaymentResult<SessionSummary> {
        if !self.is_valid_session_id(session_id) {
            return Err(PaymentError::InvalidRequest(
                "Invalid session ID format".to_string(),
            ));
        }

        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.config.api_base_url, session_id
        );
        let query: Vec<(&str, &str)> = SESSION_EXPANSIONS
            .iter()
            .map(|field| ("expand[]", *field))
            .collect();

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .query(&query)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            let err = Self::api_error(status, &body, Some(session_id));
            if !matches!(err, PaymentError::SessionNotFound { .. }) {
                error!("Stripe API error: status={}, body={}", status, body);
            }
            return Err(err);
        }

        let session: StripeSessionObject = serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse Stripe session: {}", e))
        })?;

        debug!(
            "Retrieved Stripe session: id={}, payment_status={}",
            session.id, session.payment_status
        );

        Ok(session.into_summary())
    }

    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> PaymentResult<WebhookEvent> {
        webhook::construct_event(
            payload,
            signature,
            &self.config.webhook_secret,
            self.config.webhook_tolerance_secs,
        )
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn is_valid_session_id(&self, session_id: &str) -> bool {
        session_id.starts_with("cs_")
            && session_id.len() >= MIN_SESSION_ID_LEN
            && session_id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// A field Stripe returns as an id unless expanded
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expandable<T> {
    Object(T),
    Id(String),
}

impl<T> Expandable<T> {
    fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Object(obj) => Some(obj),
            Expandable::Id(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeSessionObject {
    id: String,
    payment_status: String,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_details: Option<StripeCustomerDetails>,
    #[serde(default)]
    payment_intent: Option<Expandable<StripePaymentIntent>>,
    #[serde(default)]
    payment_method_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomerDetails {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    #[serde(default)]
    payment_method_types: Vec<String>,
    #[serde(default)]
    latest_charge: Option<Expandable<StripeCharge>>,
}

#[derive(Debug, Deserialize)]
struct StripeCharge {
    #[serde(default)]
    receipt_url: Option<String>,
    #[serde(default)]
    payment_method_details: Option<StripePaymentMethodDetails>,
}

#[derive(Debug, Deserialize)]
struct StripePaymentMethodDetails {
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl StripeSessionObject {
    fn customer(&self) -> Option<CustomerDetails> {
        let details = self.customer_details.as_ref();
        let customer = CustomerDetails {
            email: details
                .and_then(|d| d.email.clone())
                .or_else(|| self.customer_email.clone()),
            name: details.and_then(|d| d.name.clone()),
        };

        if customer.email.is_none() && customer.name.is_none() {
            None
        } else {
            Some(customer)
        }
    }

    fn payment(&self) -> PaymentDetails {
        let (payment_id, intent) = match &self.payment_intent {
            Some(Expandable::Object(pi)) => (Some(pi.id.clone()), Some(pi)),
            Some(Expandable::Id(id)) => (Some(id.clone()), None),
            None => (None, None),
        };
        let charge = intent
            .and_then(|pi| pi.latest_charge.as_ref())
            .and_then(Expandable::as_object);

        let payment_method = charge
            .and_then(|c| c.payment_method_details.as_ref())
            .and_then(|d| d.kind.clone())
            .or_else(|| intent.and_then(|pi| pi.payment_method_types.first().cloned()))
            .or_else(|| self.payment_method_types.first().cloned());

        PaymentDetails {
            payment_method,
            payment_id,
            receipt_url: charge.and_then(|c| c.receipt_url.clone()),
        }
    }

    fn into_summary(self) -> SessionSummary {
        let customer = self.customer();
        let payment = (self.payment_status == "paid").then(|| self.payment());

        SessionSummary {
            session_id: self.id,
            payment_status: self.payment_status,
            amount_minor: self.amount_total.unwrap_or(0),
            customer,
            payment,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pay_core::ValidatedOrder;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> StripeGateway {
        let config = StripeConfig::new("sk_test_123", "whsec_test").with_api_base_url(server.uri());
        StripeGateway::new(config).unwrap()
    }

    fn checkout_request() -> CheckoutRequest {
        CheckoutRequest {
            order: ValidatedOrder {
                server_provider: "aternos".into(),
                username: "alex".into(),
                amount_minor: 5000,
            },
            request_id: "req-abc".into(),
            idempotency_key: "idem-abc".into(),
            client_ip: "203.0.113.7".into(),
            success_url: "https://shop.test/success?session_id={CHECKOUT_SESSION_ID}".into(),
            cancel_url: "https://shop.test/cancel".into(),
        }
    }

    #[test]
    fn test_checkout_form() {
        let form = StripeGateway::checkout_form(&checkout_request(), 1_700_001_800);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("expires_at"), Some("1700001800"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("5000"));
        assert_eq!(get("line_items[0][quantity]"), Some("1"));
        assert_eq!(get("metadata[clientIp]"), Some("203.0.113.7"));
        assert_eq!(get("metadata[requestId]"), Some("req-abc"));
        assert_eq!(get("metadata[username]"), Some("alex"));
        assert_eq!(get("metadata[serverProvider]"), Some("aternos"));
    }

    #[test]
    fn test_session_id_format() {
        let config = StripeConfig::new("sk_test_123", "whsec_test");
        let gateway = StripeGateway::new(config).unwrap();

        assert!(gateway.is_valid_session_id("cs_test_a1B2c3D4e5"));
        assert!(!gateway.is_valid_session_id(""));
        assert!(!gateway.is_valid_session_id("cs_short"));
        assert!(!gateway.is_valid_session_id("pi_test_a1B2c3D4e5"));
        assert!(!gateway.is_valid_session_id("cs_test_../../v1/x"));
    }

    #[tokio::test]
    async fn test_create_checkout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(header("idempotency-key", "idem-abc"))
            .and(body_string_contains("unit_amount%5D=5000"))
            .and(body_string_contains("mode=payment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_session_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_session_1",
                "expires_at": 1_700_001_800
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = gateway(&server)
            .create_checkout(&checkout_request())
            .await
            .unwrap();

        assert_eq!(session.session_id, "cs_test_session_1");
        assert_eq!(
            session.checkout_url,
            "https://checkout.stripe.com/c/pay/cs_test_session_1"
        );
        assert_eq!(session.expires_at.unwrap().timestamp(), 1_700_001_800);

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        let sent_expiry: i64 = body
            .split('&')
            .find_map(|pair| pair.strip_prefix("expires_at="))
            .unwrap()
            .parse()
            .unwrap();
        let expected = (Utc::now() + Duration::minutes(SESSION_TTL_MINUTES)).timestamp();
        assert!(
            (expected - sent_expiry).abs() <= 5,
            "expires_at {} not ~{} minutes out",
            sent_expiry,
            SESSION_TTL_MINUTES
        );
    }

    #[tokio::test]
    async fn test_create_checkout_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid API Key provided", "code": "api_key_invalid" }
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .create_checkout(&checkout_request())
            .await
            .unwrap_err();

        match err {
            PaymentError::ProviderError { provider, message } => {
                assert_eq!(provider, "stripe");
                assert_eq!(message, "Invalid API Key provided");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retrieve_paid_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_paid_123"))
            .and(query_param("expand[]", "payment_intent.latest_charge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_paid_123",
                "payment_status": "paid",
                "amount_total": 2599,
                "customer_details": { "email": "alex@example.com", "name": "Alex" },
                "payment_method_types": ["card"],
                "payment_intent": {
                    "id": "pi_test_1",
                    "payment_method_types": ["card"],
                    "latest_charge": {
                        "id": "ch_test_1",
                        "receipt_url": "https://pay.stripe.com/receipts/ch_test_1",
                        "payment_method_details": { "type": "card" }
                    }
                }
            })))
            .mount(&server)
            .await;

        let summary = gateway(&server)
            .retrieve_session("cs_test_paid_123")
            .await
            .unwrap();

        assert!(summary.is_paid());
        assert_eq!(summary.display_amount(), "25.99");
        let customer = summary.customer.unwrap();
        assert_eq!(customer.email.as_deref(), Some("alex@example.com"));
        assert_eq!(customer.name.as_deref(), Some("Alex"));
        let payment = summary.payment.unwrap();
        assert_eq!(payment.payment_method.as_deref(), Some("card"));
        assert_eq!(payment.payment_id.as_deref(), Some("pi_test_1"));
        assert_eq!(
            payment.receipt_url.as_deref(),
            Some("https://pay.stripe.com/receipts/ch_test_1")
        );
    }

    #[tokio::test]
    async fn test_retrieve_unpaid_session_has_no_payment_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_open_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_open_123",
                "payment_status": "unpaid",
                "amount_total": 1000,
                "customer_details": null,
                "payment_intent": null
            })))
            .mount(&server)
            .await;

        let summary = gateway(&server)
            .retrieve_session("cs_test_open_123")
            .await
            .unwrap();

        assert_eq!(summary.payment_status, "unpaid");
        assert_eq!(summary.display_amount(), "10.00");
        assert!(summary.customer.is_none());
        assert!(summary.payment.is_none());
    }

    #[tokio::test]
    async fn test_retrieve_missing_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_missing_1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "message": "No such checkout.session: 'cs_test_missing_1'",
                    "code": "resource_missing"
                }
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .retrieve_session("cs_test_missing_1")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::SessionNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_retrieve_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout/sessions/cs_test_broken_1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .retrieve_session("cs_test_broken_1")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::ProviderError { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_retrieve_rejects_malformed_id_without_calling_stripe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = gateway(&server).retrieve_session("bogus").await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }
}
