//! # Payment Gateway Trait
//!
//! The seam between the HTTP layer and the payment processor. The processor
//! client is built once at startup and handed to handlers as a
//! [`BoxedPaymentGateway`], so tests can substitute a fake.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentGateway (trait)                   │
//! │  ├── create_checkout()                                      │
//! │  ├── retrieve_session()                                     │
//! │  ├── verify_webhook()                                       │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!          ┌─────────────────┴─────────────────┐
//!  ┌───────┴───────┐                   ┌───────┴───────┐
//!  │ StripeGateway │                   │  test fakes   │
//!  └───────────────┘                   └───────────────┘
//! ```

use crate::error::PaymentResult;
use crate::order::{CheckoutRequest, CheckoutSession, SessionSummary, WebhookEvent};
use async_trait::async_trait;
use std::sync::Arc;

/// Placeholder the processor substitutes with the real session id
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Operations the backend needs from a hosted-checkout processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session and return its redirect URL.
    async fn create_checkout(&self, request: &CheckoutRequest) -> PaymentResult<CheckoutSession>;

    /// Look up a session's current state.
    ///
    /// Returns `PaymentError::SessionNotFound` when the processor does not
    /// know the id.
    async fn retrieve_session(&self, session_id: &str) -> PaymentResult<SessionSummary>;

    /// Verify a webhook signature and parse the event.
    ///
    /// # Arguments
    /// * `payload` - Raw webhook body bytes
    /// * `signature` - Signature header from the request
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> PaymentResult<WebhookEvent>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;

    /// Cheap syntactic check run before any lookup.
    fn is_valid_session_id(&self, session_id: &str) -> bool {
        !session_id.trim().is_empty()
    }
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

/// Redirect targets on the frontend for the hosted checkout page
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Frontend origin (e.g., "https://shop.example.com")
    pub base_url: String,
    /// Success page path (e.g., "/success")
    pub success_path: String,
    /// Cancel page path (e.g., "/cancel")
    pub cancel_path: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            success_path: "/success".to_string(),
            cancel_path: "/cancel".to_string(),
        }
    }

    /// Success URL carrying the processor's session id placeholder
    pub fn success_url(&self) -> String {
        format!(
            "{}{}?session_id={}",
            self.base_url, self.success_path, SESSION_ID_PLACEHOLDER
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}{}", self.base_url, self.cancel_path)
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:5173")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_urls() {
        let urls = CheckoutUrls::new("https://shop.example.com/");

        assert_eq!(
            urls.success_url(),
            "https://shop.example.com/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(urls.cancel_url(), "https://shop.example.com/cancel");
    }
}
