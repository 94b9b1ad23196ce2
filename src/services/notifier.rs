// src/services/notifier.rs

//! Change notifications.
//!
//! Every new or updated thread produces a log line. When email is
//! configured, new threads are also mailed; updates stay log-only.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::models::{Classification, EmailConfig, NotifyChannel, ThreadRecord};
use crate::services::{Mailer, Notifier};

const SUBJECT_PREFIX: &str = "[watchwatch]";

/// Rendered text for a single change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Log line
    pub log_line: String,
    /// Email subject, `None` when the change is never mailed
    pub email_subject: Option<String>,
    /// Fully-qualified thread link, used as the email body
    pub link: String,
}

impl Notification {
    /// Render a change; `None` for unchanged threads.
    pub fn compose(
        thread: &ThreadRecord,
        classification: Classification,
        base_url: &str,
    ) -> Option<Self> {
        let link = thread.full_link(base_url);
        let title = thread.display_title();

        match classification {
            Classification::New => {
                let subject = format!("new thread: {title}");
                Some(Self {
                    log_line: format!("{subject}\n\t{link}"),
                    email_subject: Some(format!("{SUBJECT_PREFIX} {subject}")),
                    link,
                })
            }
            Classification::Updated => Some(Self {
                log_line: format!("UPDATED THREAD:\n\t{title}\n\t{link}"),
                email_subject: None,
                link,
            }),
            Classification::Unchanged => None,
        }
    }
}

/// Notifier that logs every change and optionally mails new threads.
pub struct ThreadNotifier {
    base_url: String,
    mailer: Option<Box<dyn Mailer>>,
}

impl ThreadNotifier {
    /// Log-only notifier.
    pub fn log_only(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            mailer: None,
        }
    }

    /// Notifier that also mails new threads through `mailer`.
    pub fn with_mailer(base_url: impl Into<String>, mailer: Box<dyn Mailer>) -> Self {
        Self {
            base_url: base_url.into(),
            mailer: Some(mailer),
        }
    }

    /// Build the notifier for the configured channel.
    pub fn from_channel(base_url: impl Into<String>, channel: &NotifyChannel) -> Result<Self> {
        match channel {
            NotifyChannel::LogOnly => Ok(Self::log_only(base_url)),
            NotifyChannel::LogAndEmail(email) => Ok(Self::with_mailer(
                base_url,
                Box::new(SmtpMailer::new(email)?),
            )),
        }
    }

    /// Whether new threads are also mailed.
    pub fn sends_email(&self) -> bool {
        self.mailer.is_some()
    }
}

#[async_trait]
impl Notifier for ThreadNotifier {
    async fn notify(&self, thread: &ThreadRecord, classification: Classification) -> Result<()> {
        let Some(notification) = Notification::compose(thread, classification, &self.base_url)
        else {
            return Ok(());
        };

        log::info!("{}", notification.log_line);

        if let (Some(mailer), Some(subject)) = (&self.mailer, &notification.email_subject) {
            mailer.send(subject, &notification.link).await?;
        }
        Ok(())
    }
}

/// SMTP mailer using a STARTTLS relay with login credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(email: &EmailConfig) -> Result<Self> {
        let from: Mailbox = email
            .from
            .parse()
            .map_err(|e| AppError::config(format!("Invalid email_from '{}': {e}", email.from)))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::config(format!("Invalid email_to '{}': {e}", email.to)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&email.smtp_host)
            .map_err(|e| AppError::config(format!("Invalid smtp_host '{}': {e}", email.smtp_host)))?
            .port(email.smtp_port)
            .credentials(Credentials::new(email.from.clone(), email.password.clone()))
            .build();

        Ok(Self { transport, from, to })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(AppError::notify)?;

        self.transport
            .send(message)
            .await
            .map_err(AppError::notify)?;
        log::debug!("Mailed '{}' to {}", subject, self.to);
        Ok(())
    }
}
