//! Outgoing email
//!
//! Handlers only see the [`Mailer`] trait. [`SmtpMailer`] delivers through an
//! SMTP relay with lettre; [`MemoryMailer`] keeps every message in memory and
//! is what tests and relay-less local setups use.

use crate::config::{MailConfig, MailTransport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl Email {
    /// Mail carrying a password reset link
    pub fn password_reset(to: impl Into<String>, reset_url: &str) -> Self {
        Self {
            to: to.into(),
            subject: "Your password reset token (valid for 10 min)".to_string(),
            text: format!(
                "Forgot your password? Submit a PATCH request with your new password and \
                 passwordConfirm to: {}.\nIf you didn't forget your password, please ignore this email!",
                reset_url
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;
}

/// Build the mailer selected by the configuration
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.transport {
        MailTransport::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
        MailTransport::Memory => Ok(Arc::new(MemoryMailer::new())),
    }
}

// =============================================================================
// SMTP
// =============================================================================

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .with_context(|| format!("invalid SMTP relay '{}'", config.host))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let builder = builder.port(config.port);
        let builder = if config.username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
        };

        let from = config
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid sender address '{}'", config.from))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<()> {
        let to = email
            .to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid recipient address '{}'", email.to))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.text)
            .context("failed to build message")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        tracing::info!(to = %email.to, "email sent");
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Records messages instead of sending them
#[derive(Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<RwLock<Vec<Email>>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every delivery fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every message accepted so far, oldest first
    pub fn sent(&self) -> Vec<Email> {
        self.outbox
            .read()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    pub fn last_sent_to(&self, address: &str) -> Option<Email> {
        self.sent().into_iter().rev().find(|e| e.to == address)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: Email) -> Result<()> {
        if self.fail {
            anyhow::bail!("mail delivery disabled");
        }
        tracing::debug!(to = %email.to, subject = %email.subject, "email stored in memory");
        self.outbox
            .write()
            .map_err(|e| anyhow::anyhow!("outbox lock poisoned: {}", e))?
            .push(email);
        Ok(())
    }
}
