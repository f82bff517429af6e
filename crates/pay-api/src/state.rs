//! # Application State
//!
//! Shared state for the Axum application: configuration plus the payment
//! gateway and notifier, each built once and shared behind an `Arc`.

use pay_core::{BoxedNotifier, BoxedPaymentGateway, CheckoutUrls, PaymentError};
use pay_notify::{MailConfig, MailNotifier};
use pay_stripe::StripeGateway;
use std::net::SocketAddr;
use std::sync::Arc;

/// Per-IP request throttling for the public routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed in a burst
    pub burst_size: u32,
    /// Seconds to replenish one request of quota
    pub replenish_secs: u64,
}

impl Default for RateLimitConfig {
    /// Roughly 100 requests per 15 minutes
    fn default() -> Self {
        Self {
            burst_size: 100,
            replenish_secs: 9,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Frontend origin, used for CORS and checkout redirects
    pub frontend_url: String,
    /// Environment (development, production)
    pub environment: String,
    /// `None` disables throttling
    pub rate_limit: Option<RateLimitConfig>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok();

        let port = match std::env::var("PORT") {
            Ok(p) => p.parse().map_err(|_| {
                PaymentError::Configuration(format!("PORT is not a valid port: {}", p))
            })?,
            Err(_) => 3000,
        };

        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        let rate_limit = rate_limit_enabled.then(|| {
            let defaults = RateLimitConfig::default();
            RateLimitConfig {
                burst_size: env_number("RATE_LIMIT_BURST").unwrap_or(defaults.burst_size),
                replenish_secs: env_number("RATE_LIMIT_REPLENISH_SECS")
                    .unwrap_or(defaults.replenish_secs),
            }
        });

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .trim_end_matches('/')
                .to_string(),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            rate_limit,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> Result<SocketAddr, PaymentError> {
        format!("{}:{}", self.host, self.port).parse().map_err(|_| {
            PaymentError::Configuration(format!(
                "Invalid socket address: {}:{}",
                self.host, self.port
            ))
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    /// Whether error responses may include internal detail
    pub fn expose_error_details(&self) -> bool {
        !self.is_production()
    }
}

/// Positive integer from the environment; zero or garbage is ignored.
fn env_number<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialEq + Default,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .filter(|v| *v != T::default())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Hosted-checkout processor
    pub gateway: BoxedPaymentGateway,
    /// Operator alerts
    pub notifier: BoxedNotifier,
    /// Checkout redirect URLs
    pub urls: CheckoutUrls,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Build the production services (Stripe + SMTP) from the environment
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let gateway = StripeGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        let mail_config = MailConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load mail settings: {}", e))?;
        tracing::info!(
            "Notifications: service={}, relay={}, operator={}",
            mail_config.service,
            mail_config.host,
            mail_config.operator
        );
        let notifier = MailNotifier::smtp(&mail_config)
            .map_err(|e| anyhow::anyhow!("Failed to initialize mail transport: {}", e))?;

        Ok(Self::with_services(
            config,
            Arc::new(gateway),
            Arc::new(notifier),
        ))
    }

    /// Assemble state from already-built services
    pub fn with_services(
        config: AppConfig,
        gateway: BoxedPaymentGateway,
        notifier: BoxedNotifier,
    ) -> Self {
        let urls = CheckoutUrls::new(&config.frontend_url);
        Self {
            gateway,
            notifier,
            urls,
            config,
        }
    }
}
