//! # Stripe Webhook Handling
//!
//! Signature verification and event parsing for Stripe webhooks.
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 using the
//! endpoint secret and sends `Stripe-Signature: t=<ts>,v1=<hex>[,v1=<hex>]`.
//! Verification must run against the exact bytes received, before any JSON
//! parsing.

use hmac::{Hmac, Mac};
use pay_core::{PaymentError, PaymentNotification, PaymentResult, WebhookEvent, WebhookEventType};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Metadata value used when a completed session lacks a field
const UNKNOWN: &str = "unknown";

/// Parsed `Stripe-Signature` header
#[derive(Debug)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

/// Split a `Stripe-Signature` header into its timestamp and `v1` signatures.
pub fn parse_signature_header(header: &str) -> PaymentResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = value.parse().ok();
            }
            "v1" => {
                signatures.push(value.to_string());
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        PaymentError::WebhookVerificationFailed(
            "Unable to extract timestamp and signatures from header".to_string(),
        )
    })?;

    if signatures.is_empty() {
        return Err(PaymentError::WebhookVerificationFailed(
            "No signatures found with expected scheme".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Check a signature header against the raw payload.
///
/// `now` is unix seconds; it is a parameter so the tolerance window can be
/// exercised deterministically.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> PaymentResult<()> {
    let parsed = parse_signature_header(header)?;
    let mac = signing_mac(secret, parsed.timestamp, payload);

    // Constant-time comparison via `verify_slice`
    let valid = parsed.signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if !valid {
        return Err(PaymentError::WebhookVerificationFailed(
            "No signatures found matching the expected signature for payload".to_string(),
        ));
    }

    if now.abs_diff(parsed.timestamp) > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::WebhookVerificationFailed(
            "Timestamp outside the tolerance zone".to_string(),
        ));
    }

    Ok(())
}

/// Produce a valid `Stripe-Signature` header for a payload.
///
/// Used by tests and local tooling that replay events.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let signature = hex::encode(signing_mac(secret, timestamp, payload).finalize().into_bytes());
    format!("t={},v1={}", timestamp, signature)
}

/// Verify a webhook and parse it into a [`WebhookEvent`].
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
) -> PaymentResult<WebhookEvent> {
    verify_signature(
        payload,
        header,
        secret,
        tolerance_secs,
        chrono::Utc::now().timestamp(),
    )?;

    let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
        PaymentError::WebhookParseError(format!("Failed to parse webhook: {}", e))
    })?;

    debug!("Verified Stripe webhook: type={}", event.event_type);

    let object = &event.data.object;
    let str_field = |key: &str| object.get(key).and_then(|v| v.as_str()).map(String::from);

    // `payment_intent` is an id here, but may be an expanded object
    let payment_intent_id = object.get("payment_intent").and_then(|v| {
        v.as_str()
            .map(String::from)
            .or_else(|| v.get("id").and_then(|id| id.as_str()).map(String::from))
    });

    let metadata: HashMap<String, String> = object
        .get("metadata")
        .and_then(|m| m.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Ok(WebhookEvent {
        event_id: event.id,
        event_type: WebhookEventType::from_stripe(&event.event_type),
        session_id: str_field("id"),
        payment_intent_id,
        amount_total: object.get("amount_total").and_then(|v| v.as_i64()),
        payment_status: str_field("payment_status"),
        metadata,
        timestamp: chrono::DateTime::from_timestamp(event.created, 0)
            .unwrap_or_else(chrono::Utc::now),
    })
}

/// Fields of a paid `checkout.session.completed` event needed for the alert
#[derive(Debug, Clone)]
pub struct CheckoutCompletedData {
    pub session_id: String,
    pub payment_intent_id: Option<String>,
    pub amount_total: i64,
    pub metadata: HashMap<String, String>,
}

impl CheckoutCompletedData {
    /// Extract from a verified event; fails for other event types.
    pub fn from_event(event: &WebhookEvent) -> PaymentResult<Self> {
        if event.event_type != WebhookEventType::CheckoutCompleted {
            return Err(PaymentError::WebhookParseError(format!(
                "Expected checkout.session.completed, got {:?}",
                event.event_type
            )));
        }

        let session_id = event
            .session_id
            .clone()
            .ok_or_else(|| PaymentError::WebhookParseError("Missing session id".to_string()))?;

        Ok(Self {
            session_id,
            payment_intent_id: event.payment_intent_id.clone(),
            amount_total: event.amount_total.unwrap_or(0),
            metadata: event.metadata.clone(),
        })
    }

    fn metadata_or_unknown(&self, key: &str) -> String {
        match self.metadata.get(key).filter(|v| !v.is_empty()) {
            Some(value) => value.clone(),
            None => {
                warn!(session_id = %self.session_id, "Completed session missing metadata {}", key);
                UNKNOWN.to_string()
            }
        }
    }

    /// Payment intent id, falling back to the session id
    pub fn payment_id(&self) -> &str {
        self.payment_intent_id.as_deref().unwrap_or(&self.session_id)
    }

    /// Operator alert for this payment, amount converted to major units
    pub fn to_notification(&self) -> PaymentNotification {
        PaymentNotification::from_minor(
            self.metadata_or_unknown("serverProvider"),
            self.metadata_or_unknown("username"),
            self.amount_total,
            self.payment_id(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    fn completed_payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_test_1",
            "type": "checkout.session.completed",
            "created": 1_700_000_000,
            "data": {
                "object": {
                    "id": "cs_test_123",
                    "payment_intent": "pi_test_456",
                    "amount_total": 2599,
                    "currency": "usd",
                    "payment_status": "paid",
                    "metadata": {
                        "serverProvider": "aternos",
                        "username": "alex",
                        "requestId": "req-1"
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_signature_header() {
        let header = "t=1234567890,v1=abc123,v1=def456,v0=ignored";
        let parsed = parse_signature_header(header).unwrap();

        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures, vec!["abc123", "def456"]);
    }

    #[test]
    fn test_parse_signature_header_missing_parts() {
        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("t=123").is_err());
        assert!(parse_signature_header("").is_err());
        assert!(parse_signature_header("garbage").is_err());
    }

    #[test]
    fn test_verify_roundtrip() {
        let payload = completed_payload();
        let header = signature_header(SECRET, 1_700_000_000, &payload);

        assert!(verify_signature(&payload, &header, SECRET, 300, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_verify_wrong_secret() {
        let payload = completed_payload();
        let header = signature_header("whsec_other", 1_700_000_000, &payload);

        let err = verify_signature(&payload, &header, SECRET, 300, 1_700_000_000).unwrap_err();
        assert!(matches!(err, PaymentError::WebhookVerificationFailed(_)));
    }

    #[test]
    fn test_verify_modified_payload() {
        let payload = completed_payload();
        let header = signature_header(SECRET, 1_700_000_000, &payload);
        let mut tampered = payload.clone();
        tampered.extend_from_slice(b" ");

        assert!(verify_signature(&tampered, &header, SECRET, 300, 1_700_000_000).is_err());
    }

    #[test]
    fn test_verify_old_timestamp() {
        let payload = completed_payload();
        let header = signature_header(SECRET, 1_700_000_000, &payload);

        let err = verify_signature(&payload, &header, SECRET, 300, 1_700_000_301).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_verify_extreme_timestamp() {
        let payload = completed_payload();

        for timestamp in [i64::MIN, i64::MAX] {
            let header = signature_header(SECRET, timestamp, &payload);
            let err = verify_signature(&payload, &header, SECRET, 300, 1_700_000_000).unwrap_err();
            assert!(err.to_string().contains("tolerance"));
        }
    }

    #[test]
    fn test_verify_accepts_any_matching_signature() {
        let payload = completed_payload();
        let good = signature_header(SECRET, 1_700_000_000, &payload);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=1700000000,v1=not-hex,v1={}", good_sig);

        assert!(verify_signature(&payload, &header, SECRET, 300, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_construct_event_checkout_completed() {
        let payload = completed_payload();
        let header = signature_header(SECRET, chrono::Utc::now().timestamp(), &payload);

        let event = construct_event(&payload, &header, SECRET, 300).unwrap();
        assert_eq!(event.event_id, "evt_test_1");
        assert_eq!(event.event_type, WebhookEventType::CheckoutCompleted);
        assert_eq!(event.session_id.as_deref(), Some("cs_test_123"));
        assert_eq!(event.payment_intent_id.as_deref(), Some("pi_test_456"));
        assert_eq!(event.amount_total, Some(2599));
        assert!(event.is_paid_checkout());
        assert_eq!(event.metadata["username"], "alex");
    }

    #[test]
    fn test_construct_event_rejects_non_json() {
        let payload = b"not json".to_vec();
        let header = signature_header(SECRET, chrono::Utc::now().timestamp(), &payload);

        let err = construct_event(&payload, &header, SECRET, 300).unwrap_err();
        assert!(matches!(err, PaymentError::WebhookParseError(_)));
    }

    #[test]
    fn test_checkout_completed_notification() {
        let payload = completed_payload();
        let header = signature_header(SECRET, chrono::Utc::now().timestamp(), &payload);
        let event = construct_event(&payload, &header, SECRET, 300).unwrap();

        let data = CheckoutCompletedData::from_event(&event).unwrap();
        let notification = data.to_notification();

        assert_eq!(notification.server_provider, "aternos");
        assert_eq!(notification.username, "alex");
        assert_eq!(notification.amount, 25.99);
        assert_eq!(notification.payment_id, "pi_test_456");
    }

    #[test]
    fn test_notification_defaults() {
        let data = CheckoutCompletedData {
            session_id: "cs_test_999".into(),
            payment_intent_id: None,
            amount_total: 100,
            metadata: HashMap::new(),
        };
        let notification = data.to_notification();

        assert_eq!(notification.server_provider, "unknown");
        assert_eq!(notification.username, "unknown");
        assert_eq!(notification.payment_id, "cs_test_999");
    }
}
