//! Outbound notifications: overdue fine reminders and entry welcomes
//!
//! Delivery is best effort. Callers log failures and carry on.

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
    models::{FineDetails, Scan, Student},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Remind a student of an unpaid fine
    async fn fine_reminder(&self, fine: &FineDetails) -> AppResult<()>;

    /// Greet a student whose card was read at the gate
    async fn entry_welcome(&self, student: &Student, scan: &Scan) -> AppResult<()>;
}

/// Pick the notifier matching the email configuration
pub fn from_config(config: &EmailConfig) -> Arc<dyn Notifier> {
    if config.enabled {
        Arc::new(EmailNotifier::new(config.clone()))
    } else {
        Arc::new(LogNotifier)
    }
}

/// Writes notifications to the log instead of delivering them
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn fine_reminder(&self, fine: &FineDetails) -> AppResult<()> {
        tracing::info!(
            fine_id = %fine.fine.id,
            amount = fine.fine.amount,
            student = fine.student.as_ref().map(|s| s.prn_number.as_str()).unwrap_or("-"),
            "Fine reminder (email disabled): {}",
            fine.fine.reason
        );
        Ok(())
    }

    async fn entry_welcome(&self, student: &Student, scan: &Scan) -> AppResult<()> {
        tracing::info!(
            prn = %student.prn_number,
            scan_type = %scan.scan_type,
            "Entry welcome (email disabled) for {}",
            student.name
        );
        Ok(())
    }
}

/// SMTP delivery through lettre
#[derive(Clone)]
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> AppResult<Message> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("Digital Library");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body(body)),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let message = self.build_message(to, subject, body)?;
        let mailer = self.transport()?;

        // The SMTP transport blocks; keep it off the async workers
        tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

/// Wrap a plain-text body as HTML; markup in names and reasons stays text
fn html_body(body: &str) -> String {
    let escaped = body
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br>");
    format!("<html><body><p>{}</p></body></html>", escaped)
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn fine_reminder(&self, fine: &FineDetails) -> AppResult<()> {
        let Some(student) = fine.student.as_ref() else {
            return Err(AppError::NotFound(format!(
                "Fine {} has no student to notify",
                fine.fine.id
            )));
        };
        let title = fine
            .book
            .as_ref()
            .map(|b| b.title.as_str())
            .unwrap_or("a borrowed book");

        let body = format!(
            "Dear {name},\n\nYou have an unpaid fine of {amount} for \"{title}\".\nReason: {reason}.\n\nPlease return the book and clear the fine at the library desk.",
            name = student.name,
            amount = fine.fine.amount,
            title = title,
            reason = fine.fine.reason,
        );

        self.send(&student.email, "Library fine reminder", &body).await
    }

    async fn entry_welcome(&self, student: &Student, scan: &Scan) -> AppResult<()> {
        let body = format!(
            "Hello {name},\n\nYour library card was scanned ({kind}) at {at}.\nYou have {credits} borrow credit(s) left.",
            name = student.name,
            kind = scan.scan_type,
            at = scan.scanned_at.format("%Y-%m-%d %H:%M UTC"),
            credits = student.credits,
        );

        self.send(&student.email, "Welcome to the library", &body).await
    }
}
