//! Outgoing mail
//!
//! Password-reset links are sent over SMTP when a host is configured. Without
//! one, the message is written to the log instead so local setups keep working.

use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailConfig;

/// A plain-text message ready to be delivered
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    /// The password reset message pointing at `link`
    pub fn password_reset(to: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset Your Password".to_string(),
            body: format!("Click Following Link to Reset Your Password {}", link),
        }
    }
}

/// Email service
pub struct EmailService {
    config: MailConfig,
}

impl EmailService {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Build the reset link for an encoded user id and token
    pub fn reset_link(&self, uid: &str, token: &str) -> String {
        format!("{}{}/{}", self.config.reset_link_base, uid, token)
    }

    /// Deliver a message, or log it when SMTP is not configured
    pub async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let host = match self.config.smtp_host.as_deref() {
            Some(host) if self.config.is_enabled() => host.trim(),
            _ => {
                tracing::info!(to = %mail.to, subject = %mail.subject, "Mail (SMTP disabled): {}", mail.body);
                return Ok(());
            }
        };

        let message = Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| anyhow!("Invalid from address: {}", e))?,
            )
            .to(mail
                .to
                .parse()
                .map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(self.config.smtp_port);
        if let (Some(user), Some(pass)) = (&self.config.smtp_username, &self.config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        builder
            .build()
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        tracing::info!(to = %mail.to, "Sent mail: {}", mail.subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_link() {
        let service = EmailService::new(MailConfig {
            reset_link_base: "https://app.example.com/reset/".to_string(),
            ..MailConfig::default()
        });
        assert_eq!(
            service.reset_link("MQ", "abc-123"),
            "https://app.example.com/reset/MQ/abc-123"
        );
    }

    #[test]
    fn test_password_reset_message() {
        let mail = OutgoingMail::password_reset("ann@example.com", "http://x/MQ/t");
        assert_eq!(mail.to, "ann@example.com");
        assert_eq!(mail.subject, "Reset Your Password");
        assert!(mail.body.ends_with("http://x/MQ/t"));
    }

    #[tokio::test]
    async fn test_send_without_smtp_is_logged() {
        let service = EmailService::new(MailConfig::default());
        let mail = OutgoingMail::password_reset("ann@example.com", "http://x");
        assert!(service.send(&mail).await.is_ok());
    }
}
