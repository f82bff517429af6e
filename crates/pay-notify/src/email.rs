//! # Notification Email
//!
//! Renders a [`PaymentNotification`] into the operator-facing email and the
//! custom headers that carry the transaction id.

use chrono::{DateTime, Utc};
use lettre::message::header::{Header, HeaderName, HeaderValue};
use pay_core::PaymentNotification;
use std::error::Error;

/// Rendered subject and HTML body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEmail {
    pub subject: String,
    pub html: String,
}

impl NotificationEmail {
    /// Build the alert for a payment, stamped with `sent_at`.
    pub fn compose(notification: &PaymentNotification, sent_at: DateTime<Utc>) -> Self {
        let amount = notification.display_amount();
        let provider = escape_html(&notification.server_provider);
        let username = escape_html(&notification.username);
        let payment_id = escape_html(&notification.payment_id);
        let timestamp = sent_at.format("%Y-%m-%d %H:%M:%S UTC");

        let subject = format!(
            "New payment: ${} from {}",
            amount, notification.username
        );

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<body style="font-family: system-ui, sans-serif; color: #1a1a2e;">
  <h2>New payment received</h2>
  <table style="border-collapse: collapse;">
    <tr><td style="padding: 4px 12px;"><strong>Amount</strong></td><td style="padding: 4px 12px;">${amount}</td></tr>
    <tr><td style="padding: 4px 12px;"><strong>Server provider</strong></td><td style="padding: 4px 12px;">{provider}</td></tr>
    <tr><td style="padding: 4px 12px;"><strong>Username</strong></td><td style="padding: 4px 12px;">{username}</td></tr>
    <tr><td style="padding: 4px 12px;"><strong>Transaction ID</strong></td><td style="padding: 4px 12px;"><code>{payment_id}</code></td></tr>
    <tr><td style="padding: 4px 12px;"><strong>Time</strong></td><td style="padding: 4px 12px;">{timestamp}</td></tr>
  </table>
</body>
</html>
"#
        );

        Self { subject, html }
    }
}

/// Minimal HTML text escaping for values interpolated into the body
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `X-Transaction-ID` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionId(pub String);

impl Header for TransactionId {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Transaction-ID")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// `X-Entity-Ref-ID` header; keeps mail clients from threading alerts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRefId(pub String);

impl Header for EntityRefId {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Entity-Ref-ID")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}
