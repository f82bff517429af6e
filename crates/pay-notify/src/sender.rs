//! # Mail Notifier
//!
//! Sends payment alerts over any lettre [`AsyncTransport`]. Production uses
//! SMTP; tests use lettre's stub transport.

use crate::config::MailConfig;
use crate::email::{EntityRefId, NotificationEmail, TransactionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use pay_core::{Notifier, PaymentError, PaymentNotification, PaymentResult};
use std::fmt::Display;
use tracing::{error, info, instrument};

/// Operator alert sender
pub struct MailNotifier<T> {
    transport: T,
    from: Mailbox,
    operator: Mailbox,
}

impl MailNotifier<AsyncSmtpTransport<Tokio1Executor>> {
    /// Build an SMTP-backed notifier. The connection is opened lazily on the
    /// first send.
    pub fn smtp(config: &MailConfig) -> PaymentResult<Self> {
        let builder = if config.uses_starttls() {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        }
        .map_err(|e| {
            PaymentError::Configuration(format!("Invalid SMTP relay {}: {}", config.host, e))
        })?;

        let mut builder = builder.credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ));
        if let Some(port) = config.port {
            builder = builder.port(port);
        }

        Self::new(builder.build(), &config.from, &config.operator)
    }
}

impl<T> MailNotifier<T>
where
    T: AsyncTransport + Send + Sync,
    T::Error: Display,
{
    /// Wrap a transport. Addresses are parsed up front so a bad deployment
    /// value fails at startup rather than on the first payment.
    pub fn new(transport: T, from: &str, operator: &str) -> PaymentResult<Self> {
        let from: Mailbox = from.parse().map_err(|e| {
            PaymentError::Configuration(format!("Invalid sender address {}: {}", from, e))
        })?;
        let operator: Mailbox = operator.parse().map_err(|e| {
            PaymentError::Configuration(format!("Invalid operator address {}: {}", operator, e))
        })?;

        Ok(Self {
            transport,
            from,
            operator,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Assemble the MIME message for one alert
    pub fn build_message(
        &self,
        notification: &PaymentNotification,
        sent_at: DateTime<Utc>,
    ) -> PaymentResult<Message> {
        let email = NotificationEmail::compose(notification, sent_at);

        Message::builder()
            .from(self.from.clone())
            .to(self.operator.clone())
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .header(TransactionId(notification.payment_id.clone()))
            .header(EntityRefId(notification.payment_id.clone()))
            .body(email.html)
            .map_err(|e| PaymentError::Notification(format!("Failed to build email: {}", e)))
    }

    /// Send the alert. Never errors: failures are logged and reported as
    /// `false`.
    #[instrument(skip(self, notification), fields(payment_id = %notification.payment_id))]
    pub async fn send_payment_notification(&self, notification: &PaymentNotification) -> bool {
        let message = match self.build_message(notification, Utc::now()) {
            Ok(message) => message,
            Err(e) => {
                error!("Payment notification not sent: {}", e);
                return false;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => {
                info!(
                    "Payment notification sent: amount={}, provider={}",
                    notification.display_amount(),
                    notification.server_provider
                );
                true
            }
            Err(e) => {
                error!("Failed to send payment notification: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl<T> Notifier for MailNotifier<T>
where
    T: AsyncTransport + Send + Sync,
    T::Error: Display,
{
    async fn notify(&self, notification: &PaymentNotification) -> bool {
        self.send_payment_notification(notification).await
    }
}
