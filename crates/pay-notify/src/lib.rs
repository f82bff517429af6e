//! # pay-notify
//!
//! Operator email notifications for checkout-relay.
//!
//! One alert per completed payment, sent to a fixed operator address. The
//! sender implements [`pay_core::Notifier`] and never propagates failures:
//! a broken SMTP relay yields `false` and an error log, nothing more.
//!
//! ```rust,ignore
//! use pay_notify::{MailConfig, MailNotifier};
//!
//! let notifier = MailNotifier::smtp(&MailConfig::from_env()?)?;
//! let delivered = notifier.send_payment_notification(&notification).await;
//! ```

pub mod config;
pub mod email;
pub mod sender;

pub use config::{resolve_service_host, MailConfig};
pub use email::NotificationEmail;
pub use sender::MailNotifier;
