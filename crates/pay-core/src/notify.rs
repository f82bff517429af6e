//! # Operator Notifications
//!
//! Payload and trait for the "payment received" alert sent to the operator.

use crate::money;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Data for one payment alert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotification {
    pub server_provider: String,
    pub username: String,
    /// Major units (dollars)
    pub amount: f64,
    pub payment_id: String,
}

impl PaymentNotification {
    /// Build from an amount in minor units
    pub fn from_minor(
        server_provider: impl Into<String>,
        username: impl Into<String>,
        amount_minor: i64,
        payment_id: impl Into<String>,
    ) -> Self {
        Self {
            server_provider: server_provider.into(),
            username: username.into(),
            amount: money::to_major_units(amount_minor),
            payment_id: payment_id.into(),
        }
    }

    pub fn display_amount(&self) -> String {
        format!("{:.2}", self.amount)
    }
}

/// Sends operator alerts.
///
/// Implementations never fail past their own boundary: delivery problems are
/// logged and reported as `false`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &PaymentNotification) -> bool;
}

/// Type alias for a shared notifier
pub type BoxedNotifier = Arc<dyn Notifier>;
