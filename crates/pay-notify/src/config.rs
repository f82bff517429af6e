//! # Mail Configuration
//!
//! SMTP settings for operator notifications, loaded from the environment.

use pay_core::PaymentError;
use std::env;

/// Port that switches the transport to STARTTLS instead of implicit TLS
pub const SUBMISSION_PORT: u16 = 587;

/// SMTP configuration
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Well-known service name (`gmail`, `outlook`, ...) or a host name
    pub service: String,
    /// Resolved relay host
    pub host: String,
    /// Explicit port; `None` uses the implicit-TLS default (465)
    pub port: Option<u16>,
    /// SMTP login
    pub username: String,
    pub password: String,
    /// Sender mailbox
    pub from: String,
    /// Operator address that receives every alert
    pub operator: String,
}

impl MailConfig {
    /// Load configuration from environment variables.
    ///
    /// Required: `EMAIL_USER`, `EMAIL_PASSWORD`, `NOTIFICATION_EMAIL`.
    /// Optional: `EMAIL_SERVICE` (default `gmail`), `SMTP_HOST`, `SMTP_PORT`,
    /// `EMAIL_FROM` (default `EMAIL_USER`).
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok();

        let required = |key: &str| {
            env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::Configuration(format!("{} not set", key)))
        };

        let username = required("EMAIL_USER")?;
        let password = required("EMAIL_PASSWORD")?;
        let operator = required("NOTIFICATION_EMAIL")?;

        let service = env::var("EMAIL_SERVICE").unwrap_or_else(|_| "gmail".to_string());
        let host = env::var("SMTP_HOST").unwrap_or_else(|_| resolve_service_host(&service));
        let port = match env::var("SMTP_PORT") {
            Ok(p) => Some(p.parse().map_err(|_| {
                PaymentError::Configuration(format!("SMTP_PORT is not a valid port: {}", p))
            })?),
            Err(_) => None,
        };
        let from = env::var("EMAIL_FROM").unwrap_or_else(|_| username.clone());

        Ok(Self {
            service,
            host,
            port,
            username,
            password,
            from,
            operator,
        })
    }

    /// Whether the connection should upgrade with STARTTLS
    pub fn uses_starttls(&self) -> bool {
        self.port == Some(SUBMISSION_PORT)
    }
}

/// Map a well-known mail service name to its SMTP relay.
///
/// Unrecognised names are assumed to already be a host.
pub fn resolve_service_host(service: &str) -> String {
    let host = match service.trim().to_ascii_lowercase().as_str() {
        "gmail" | "googlemail" => "smtp.gmail.com",
        "outlook" | "hotmail" | "outlook365" => "smtp-mail.outlook.com",
        "yahoo" => "smtp.mail.yahoo.com",
        "sendgrid" => "smtp.sendgrid.net",
        "mailgun" => "smtp.mailgun.org",
        "zoho" => "smtp.zoho.com",
        "icloud" => "smtp.mail.me.com",
        _ => return service.trim().to_string(),
    };
    host.to_string()
}
