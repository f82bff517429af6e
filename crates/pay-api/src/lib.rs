//! # pay-api
//!
//! HTTP API layer for checkout-relay.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Checkout creation and payment verification endpoints
//! - The processor webhook, which triggers operator notifications
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/checkout` | Create checkout session |
//! | GET | `/verify-payment/{sessionId}` | Session payment status |
//! | POST | `/webhook` | Stripe webhook |

pub mod context;
pub mod handlers;
pub mod routes;
pub mod state;

pub use context::RequestContext;
pub use routes::create_router;
pub use state::{AppConfig, AppState, RateLimitConfig};
