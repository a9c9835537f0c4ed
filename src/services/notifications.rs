//! "Book available" notices for the head of a reservation queue

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::{Book, Member},
};

/// A copy is back on the shelf; sent to the member at the head of the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookAvailableNotice {
    pub reservation_id: i32,
    pub member: Member,
    pub book: Book,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn book_available(&self, notice: &BookAvailableNotice) -> AppResult<()>;
}

/// Pick the notifier matching the email settings
pub fn from_config(config: &EmailConfig) -> Arc<dyn Notifier> {
    if config.enabled {
        Arc::new(EmailNotifier::new(config.clone()))
    } else {
        Arc::new(LogNotifier)
    }
}

/// Records notices in the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn book_available(&self, notice: &BookAvailableNotice) -> AppResult<()> {
        tracing::info!(
            "Book available: '{}' (id={}) for {} <{}>, reservation {}",
            notice.book.title,
            notice.book.id,
            notice.member.full_name(),
            notice.member.email,
            notice.reservation_id
        );
        Ok(())
    }
}

/// Sends notices by SMTP
#[derive(Clone)]
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, notice: &BookAvailableNotice) -> AppResult<Message> {
        let from_name = self.config.smtp_from_name.as_deref().unwrap_or("Biblio");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(&format!(
            "{} <{}>",
            notice.member.full_name(),
            notice.member.email
        ))
        .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        let body = notice_body(notice);

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(format!("\"{}\" is available", notice.book.title))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
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
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn book_available(&self, notice: &BookAvailableNotice) -> AppResult<()> {
        let message = self.build_message(notice)?;
        let mailer = self.transport()?;

        // SmtpTransport blocks
        tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

fn notice_body(notice: &BookAvailableNotice) -> String {
    format!(
        r#"Hello {name},

A copy of "{title}" by {author} has been returned and is back on the shelf.

Copies on the shelf go to whoever borrows first, so come by soon.
"#,
        name = notice.member.full_name(),
        title = notice.book.title,
        author = notice.book.author,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn notice() -> BookAvailableNotice {
        BookAvailableNotice {
            reservation_id: 9,
            member: Member {
                id: 2,
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                email: "jane.doe@example.org".into(),
                membership_date: Utc::now(),
            },
            book: Book {
                id: 1,
                title: "L'Étranger".into(),
                author: "Albert Camus".into(),
                isbn: "978-2070360024".into(),
                publication_year: 1942,
                category_id: None,
                available_copies: 1,
                image_url: None,
                version: 3,
            },
        }
    }

    #[test]
    fn test_message_addresses_reserving_member() {
        let notifier = EmailNotifier::new(EmailConfig::default());
        let message = notifier.build_message(&notice()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("jane.doe@example.org"));
        assert!(raw.contains("noreply@biblio.local"));
    }

    #[test]
    fn test_body_promises_no_hold() {
        let body = notice_body(&notice());
        assert!(body.contains("Hello Jane Doe"));
        assert!(body.contains("back on the shelf"));
        assert!(!body.contains("reserv"));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.book_available(&notice()).await.is_ok());
    }
}
