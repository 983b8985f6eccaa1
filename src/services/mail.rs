//! Outgoing mail.
//!
//! Only the welcome message exists today. Delivery goes through Resend; the
//! [`Mailer`] trait lets registration run without mail configured and lets
//! tests record what would have been sent.

use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;

use crate::config::MailSettings;

const WELCOME_TEMPLATE: &str = include_str!("../../templates/welcome.html");
pub const WELCOME_SUBJECT: &str = "Welcome to DogHub";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid recipient address")]
    InvalidRecipient,
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send_welcome(&self, full_name: &str, email: &str) -> Result<(), MailError>;
}

/// Escape text for inclusion in HTML element content or attributes.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// Body of the welcome message for a freshly registered member.
#[must_use]
pub fn welcome_email(full_name: &str, email: &str) -> String {
    let name = full_name.trim();
    let name = if name.is_empty() { "friend" } else { name };
    WELCOME_TEMPLATE
        .replace("{{NAME}}", &escape_html(name))
        .replace("{{EMAIL}}", &escape_html(email.trim()))
}

pub struct ResendMailer {
    client: Resend,
    from: String,
}

impl ResendMailer {
    #[must_use]
    pub fn new(settings: &MailSettings) -> Self {
        Self { client: Resend::new(&settings.api_key), from: settings.from.clone() }
    }
}

#[async_trait::async_trait]
impl Mailer for ResendMailer {
    async fn send_welcome(&self, full_name: &str, email: &str) -> Result<(), MailError> {
        let to = email.trim();
        if to.is_empty() || !to.contains('@') {
            return Err(MailError::InvalidRecipient);
        }
        let html = welcome_email(full_name, to);
        let message = CreateEmailBaseOptions::new(&self.from, [to], WELCOME_SUBJECT).with_html(&html);
        self.client
            .emails
            .send(message)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;
        tracing::info!(to, "welcome email sent");
        Ok(())
    }
}

#[cfg(test)]
#[path = "mail_test.rs"]
mod tests;
