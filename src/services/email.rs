//! Email delivery for member notifications

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::{LoanNotice, OverdueMember},
};

/// A rendered plain-text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Confirmation sent once a loan is issued
    pub fn loan_issued(notice: &LoanNotice) -> Self {
        Self {
            to: notice.email.clone(),
            subject: "Book Loaned Successfully".to_string(),
            body: format!(
                "Hello {username},\n\nYou have successfully loaned \"{title}\".\nPlease return it by the due date ({due}).",
                username = notice.username,
                title = notice.book_title,
                due = notice.due_date.format("%Y-%m-%d"),
            ),
        }
    }

    /// Reminder for a member holding overdue loans
    pub fn overdue(member: &OverdueMember) -> Self {
        Self {
            to: member.email.clone(),
            subject: "Overdue Books".to_string(),
            body: format!(
                "Hello {username},\n\nYou have {count} overdue books",
                username = member.username,
                count = member.overdue_count,
            ),
        }
    }
}

/// Outbound mail transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> AppResult<()>;
}

/// Pick the transport for the configuration
pub fn build_mailer(config: &EmailConfig) -> AppResult<Arc<dyn Mailer>> {
    if config.enabled {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        tracing::info!("Email delivery disabled, notifications will be logged");
        Ok(Arc::new(LogMailer))
    }
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    from: Mailbox,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let from_name = config.smtp_from_name.as_deref().unwrap_or("Library");
        let from = Mailbox::from_str(&format!("{} <{}>", from_name, config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let builder = if config.smtp_use_tls {
            SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&config.smtp_host)
        }
        .port(config.smtp_port);

        let builder = if let (Some(username), Some(password)) =
            (&config.smtp_username, &config.smtp_password)
        {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            builder
        };

        Ok(Self {
            from,
            transport: builder.build(),
        })
    }

    fn build(&self, message: &EmailMessage) -> AppResult<Message> {
        let to = Mailbox::from_str(&message.to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(message.body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(format!(
                                "<html><body><p>{}</p></body></html>",
                                escape_html(&message.body).replace('\n', "<br>")
                            )),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        let email = self.build(message)?;
        let transport = self.transport.clone();

        // lettre's SmtpTransport is blocking
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

/// Writes messages to the log instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "Email (delivery disabled)"
        );
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
