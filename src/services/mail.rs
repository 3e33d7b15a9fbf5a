//! Outgoing mail
//!
//! The only mail the storefront sends is the password reset link. Delivery
//! goes through the [`Mailer`] trait so the user service never knows whether
//! it is talking to a real SMTP relay or the development log sink.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::MailConfig;

/// A plain-text email ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

pub type DynMailer = Arc<dyn Mailer>;

/// SMTP delivery through a STARTTLS relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.site_name, config.from)
            .parse()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mail
                .to
                .parse()
                .map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

/// Logs mail instead of sending it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            "SMTP not configured, mail not sent:\n{}",
            mail.body
        );
        Ok(())
    }
}

/// SMTP when a host is configured, otherwise the log sink
pub fn mailer_from_config(config: &MailConfig) -> Result<DynMailer> {
    if config.smtp_enabled() {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        tracing::warn!("mail.smtp_host is empty; password reset mails will only be logged");
        Ok(Arc::new(LogMailer))
    }
}

/// Build the password reset email pointing at `link`
pub fn password_reset_mail(to: &str, link: &str, site_name: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: format!("[{}] Your password reset token", site_name),
        body: format!(
            "Hello!\n\nYour password reset token is here.\n\nFollow this link to choose a new password:\n{}\n\nThe link expires soon and works once. If you did not ask for a reset you can ignore this email.\n\n{}",
            link, site_name
        ),
    }
}

/// Keeps every mail in memory
#[cfg(test)]
#[derive(Default)]
pub struct MemoryMailer {
    pub sent: std::sync::Mutex<Vec<OutgoingMail>>,
}

#[cfg(test)]
impl MemoryMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_reset_mail() {
        let mail = password_reset_mail(
            "wes@example.com",
            "http://localhost:7777/reset?resetToken=abc",
            "Sick Fits",
        );

        assert_eq!(mail.to, "wes@example.com");
        assert!(mail.subject.starts_with("[Sick Fits]"));
        assert!(mail.body.contains("http://localhost:7777/reset?resetToken=abc"));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_mail() {
        let mail = password_reset_mail("a@example.com", "http://x/reset?resetToken=1", "Shop");
        LogMailer.send(mail).await.unwrap();
    }

    #[test]
    fn test_mailer_from_config_without_host() {
        let config = MailConfig::default();
        assert!(mailer_from_config(&config).is_ok());
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_from() {
        let config = MailConfig {
            smtp_host: "smtp.example.com".to_string(),
            from: "not an address".to_string(),
            ..Default::default()
        };
        assert!(SmtpMailer::new(&config).is_err());
    }

    #[test]
    fn test_smtp_mailer_builds() {
        let config = MailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_username: "user".to_string(),
            smtp_password: "pass".to_string(),
            ..Default::default()
        };
        assert!(SmtpMailer::new(&config).is_ok());
    }
}
