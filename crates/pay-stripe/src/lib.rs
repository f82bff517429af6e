//! # pay-stripe
//!
//! Stripe implementation of [`pay_core::PaymentGateway`] for checkout-relay.
//!
//! - **Checkout Sessions API**: one-line-item hosted checkout with tracing
//!   metadata and a 30 minute expiry
//! - **Session retrieval**: status, customer details, and (once paid) the
//!   payment method, payment intent and receipt
//! - **Webhooks**: `Stripe-Signature` verification against the raw body
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_stripe::StripeGateway;
//! use pay_core::PaymentGateway;
//!
//! let gateway = StripeGateway::from_env()?;
//!
//! let session = gateway.create_checkout(&request).await?;
//! // Redirect user to session.checkout_url
//!
//! let summary = gateway.retrieve_session(&session.session_id).await?;
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use pay_stripe::CheckoutCompletedData;
//!
//! let event = gateway.verify_webhook(&body, signature).await?;
//! if event.is_paid_checkout() {
//!     let data = CheckoutCompletedData::from_event(&event)?;
//!     notifier.notify(&data.to_notification()).await;
//! }
//! ```

pub mod checkout;
pub mod config;
pub mod webhook;

// Re-exports
pub use checkout::{StripeGateway, SESSION_TTL_MINUTES};
pub use config::StripeConfig;
pub use webhook::{construct_event, signature_header, CheckoutCompletedData};
