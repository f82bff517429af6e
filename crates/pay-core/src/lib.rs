//! # pay-core
//!
//! Core types and traits for the checkout-relay payment backend.
//!
//! This crate provides:
//! - `OrderRequest` and its single validation path
//! - Minor-unit amount conversion in [`money`]
//! - `PaymentGateway` trait for the hosted-checkout processor
//! - `Notifier` trait and `PaymentNotification` for operator alerts
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{CheckoutRequest, CheckoutUrls, OrderRequest};
//!
//! let order = request.validate()?;
//! let urls = CheckoutUrls::new("https://shop.example.com");
//!
//! let session = gateway
//!     .create_checkout(&CheckoutRequest {
//!         order,
//!         request_id,
//!         idempotency_key: uuid::Uuid::new_v4().to_string(),
//!         client_ip,
//!         success_url: urls.success_url(),
//!         cancel_url: urls.cancel_url(),
//!     })
//!     .await?;
//!
//! // Redirect user to session.checkout_url
//! ```

pub mod error;
pub mod gateway;
pub mod money;
pub mod notify;
pub mod order;

// Re-exports for convenience
pub use error::{PaymentError, PaymentResult};
pub use gateway::{BoxedPaymentGateway, CheckoutUrls, PaymentGateway, SESSION_ID_PLACEHOLDER};
pub use notify::{BoxedNotifier, Notifier, PaymentNotification};
pub use order::{
    AmountInput, CheckoutRequest, CheckoutSession, CustomerDetails, OrderRequest,
    PaymentDetails, SessionSummary, ValidatedOrder, WebhookEvent, WebhookEventType,
};
