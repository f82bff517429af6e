//! # Errors
//!
//! One error taxonomy shared by every crate in checkout-relay. The HTTP
//! layer turns a `PaymentError` into a status code and a client message.

use thiserror::Error;

/// Failure of a checkout, verification, webhook or notification step
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Missing or malformed deployment setting
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller input rejected by validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Processor answered with an error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Processor unreachable or response unreadable
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Signature header missing, stale or wrong
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Signed body is not a usable event
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Session unknown to the provider
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Operator notification could not be built or delivered
    #[error("Notification error: {0}")]
    Notification(String),

    /// Broken internal assumption
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Returns the HTTP status code appropriate for this error.
    ///
    /// Upstream and transport failures all surface as 500; the caller decides
    /// whether to retry.
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::InvalidRequest(_) => 400,
            PaymentError::WebhookVerificationFailed(_) => 400,
            PaymentError::WebhookParseError(_) => 400,
            PaymentError::SessionNotFound { .. } => 404,
            PaymentError::Configuration(_)
            | PaymentError::ProviderError { .. }
            | PaymentError::NetworkError(_)
            | PaymentError::Notification(_)
            | PaymentError::Internal(_)
            | PaymentError::Serialization(_) => 500,
        }
    }

    /// True for errors caused by the caller's input rather than by us or
    /// an upstream service.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Shorthand used across the workspace
pub type PaymentResult<T> = Result<T, PaymentError>;
