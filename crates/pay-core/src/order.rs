//! # Order Types
//!
//! Client order input, its validated form, and the processor-side records
//! (checkout sessions, session summaries, webhook events) the backend reads.

use crate::error::{PaymentError, PaymentResult};
use crate::money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Amount as submitted by the client: decimal text, or a bare JSON number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(f64),
}

impl AmountInput {
    fn as_text(&self) -> String {
        match self {
            AmountInput::Text(s) => s.clone(),
            AmountInput::Number(n) => n.to_string(),
        }
    }
}

/// Order as submitted to `POST /checkout`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[serde(default)]
    pub server_provider: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub amount: Option<AmountInput>,
}

impl OrderRequest {
    /// Validate the raw fields and compute the amount in minor units.
    ///
    /// This is the only place order input is checked; every checkout path
    /// goes through it before any processor call.
    pub fn validate(&self) -> PaymentResult<ValidatedOrder> {
        let server_provider = non_blank(self.server_provider.as_deref());
        let username = non_blank(self.username.as_deref());
        let amount = self
            .amount
            .as_ref()
            .map(AmountInput::as_text)
            .filter(|s| !s.trim().is_empty());

        let mut missing = Vec::new();
        if server_provider.is_none() {
            missing.push("serverProvider");
        }
        if username.is_none() {
            missing.push("username");
        }
        if amount.is_none() {
            missing.push("amount");
        }
        if !missing.is_empty() {
            return Err(PaymentError::InvalidRequest(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let amount_minor = money::parse_amount(amount.as_deref().unwrap_or_default())?;

        Ok(ValidatedOrder {
            server_provider: server_provider.unwrap_or_default(),
            username: username.unwrap_or_default(),
            amount_minor,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// An order that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedOrder {
    pub server_provider: String,
    pub username: String,
    /// Amount in cents
    pub amount_minor: i64,
}

impl ValidatedOrder {
    /// Two-decimal display amount
    pub fn display_amount(&self) -> String {
        money::format_minor(self.amount_minor)
    }
}

/// Everything the gateway needs to open one hosted checkout session
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order: ValidatedOrder,
    /// Request id, recorded in session metadata only
    pub request_id: String,
    /// Server-generated key for the processor's `Idempotency-Key` header
    pub idempotency_key: String,
    /// Caller IP with any `::ffff:` prefix removed
    pub client_ip: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Tracing metadata attached to the processor session
    pub fn metadata(&self) -> Vec<(&'static str, String)> {
        vec![
            ("requestId", self.request_id.clone()),
            ("clientIp", self.client_ip.clone()),
            ("username", self.order.username.clone()),
            ("serverProvider", self.order.server_provider.clone()),
        ]
    }
}

/// A checkout session created by the payment processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID
    pub session_id: String,

    /// URL to redirect customer to for payment
    pub checkout_url: String,

    /// When the session expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CheckoutSession {
    pub fn new(session_id: impl Into<String>, checkout_url: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            checkout_url: checkout_url.into(),
            expires_at: None,
        }
    }
}

/// Customer details the processor chose to disclose
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Payment details, only present once the session is paid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub receipt_url: Option<String>,
}

/// Normalized view of a processor session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    /// Processor payment status (`paid`, `unpaid`, `no_payment_required`)
    pub payment_status: String,
    pub amount_minor: i64,
    pub customer: Option<CustomerDetails>,
    pub payment: Option<PaymentDetails>,
}

impl SessionSummary {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn display_amount(&self) -> String {
        money::format_minor(self.amount_minor)
    }
}

/// Webhook event types we care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// `checkout.session.completed`
    CheckoutCompleted,
    /// `checkout.session.expired`
    CheckoutExpired,
    /// Anything else (acknowledged, ignored)
    Other(String),
}

impl WebhookEventType {
    pub fn from_stripe(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => WebhookEventType::CheckoutCompleted,
            "checkout.session.expired" => WebhookEventType::CheckoutExpired,
            other => WebhookEventType::Other(other.to_string()),
        }
    }
}

/// A verified webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider
    pub event_id: String,

    /// Event type
    pub event_type: WebhookEventType,

    /// Related session ID (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Related payment intent ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,

    /// Amount paid (in smallest unit)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_total: Option<i64>,

    /// `payment_status` of the session object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,

    /// String metadata attached at checkout
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    /// A completed checkout whose payment has cleared
    pub fn is_paid_checkout(&self) -> bool {
        self.event_type == WebhookEventType::CheckoutCompleted
            && self.payment_status.as_deref() == Some("paid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(value: serde_json::Value) -> OrderRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_validate_ok() {
        let validated = order(json!({
            "serverProvider": "  hypixel ",
            "username": "steve",
            "amount": "25.99"
        }))
        .validate()
        .unwrap();

        assert_eq!(validated.server_provider, "hypixel");
        assert_eq!(validated.username, "steve");
        assert_eq!(validated.amount_minor, 2599);
        assert_eq!(validated.display_amount(), "25.99");
    }

    #[test]
    fn test_validate_accepts_json_number() {
        let validated = order(json!({
            "serverProvider": "aternos",
            "username": "alex",
            "amount": 49.995
        }))
        .validate()
        .unwrap();
        assert_eq!(validated.amount_minor, 5000);
    }

    #[test]
    fn test_validate_missing_fields() {
        let err = order(json!({ "username": "  " })).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid request: Missing required fields: serverProvider, username, amount"
        );

        let err = order(json!({
            "serverProvider": "aternos",
            "username": "alex",
            "amount": ""
        }))
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("amount"));
    }

    #[test]
    fn test_validate_bad_amount() {
        let err = order(json!({
            "serverProvider": "aternos",
            "username": "alex",
            "amount": "lots"
        }))
        .validate()
        .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }

    #[test]
    fn test_checkout_request_metadata() {
        let request = CheckoutRequest {
            order: ValidatedOrder {
                server_provider: "aternos".into(),
                username: "alex".into(),
                amount_minor: 500,
            },
            request_id: "req-1".into(),
            idempotency_key: "idem-1".into(),
            client_ip: "10.0.0.1".into(),
            success_url: "https://shop.test/success".into(),
            cancel_url: "https://shop.test/cancel".into(),
        };

        let metadata: HashMap<_, _> = request.metadata().into_iter().collect();
        assert_eq!(metadata["requestId"], "req-1");
        assert_eq!(metadata["clientIp"], "10.0.0.1");
        assert_eq!(metadata["username"], "alex");
        assert_eq!(metadata["serverProvider"], "aternos");
    }

    #[test]
    fn test_paid_checkout_detection() {
        let mut event = WebhookEvent {
            event_id: "evt_1".into(),
            event_type: WebhookEventType::from_stripe("checkout.session.completed"),
            session_id: Some("cs_test_1".into()),
            payment_intent_id: None,
            amount_total: Some(2599),
            payment_status: Some("paid".into()),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        };
        assert!(event.is_paid_checkout());

        event.payment_status = Some("unpaid".into());
        assert!(!event.is_paid_checkout());

        event.payment_status = Some("paid".into());
        event.event_type = WebhookEventType::from_stripe("invoice.paid");
        assert_eq!(event.event_type, WebhookEventType::Other("invoice.paid".into()));
        assert!(!event.is_paid_checkout());
    }
}
