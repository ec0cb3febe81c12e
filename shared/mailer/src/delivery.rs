//! Outbound email: a [`Mailer`] seam, an in-process outbox and the task that
//! drains it.
//!
//! Request handlers enqueue [`EmailMessage`]s on the [`NotificationOutbox`]
//! after their change is persisted. A single [`NotificationDispatcher`] task
//! delivers them, retrying with backoff. Nothing here can fail the request
//! that produced the message.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use mentorhub_common::{retry_with_backoff, AppError, RetryPolicy};

use crate::config::NotificationConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("could not build message: {0}")]
    Build(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &NotificationConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Internal(format!("Invalid sender address: {}", e)))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| MailError::Build(format!("invalid recipient {}: {}", message.to, e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        tracing::info!(to = %message.to, subject = %message.subject, "email notifications disabled, not sending");
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationOutbox {
    sender: UnboundedSender<EmailMessage>,
}

impl NotificationOutbox {
    pub fn channel() -> (Self, UnboundedReceiver<EmailMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queues a message. Messages without a recipient address are skipped.
    pub fn enqueue(&self, message: EmailMessage) {
        if message.to.trim().is_empty() {
            tracing::debug!(subject = %message.subject, "recipient has no email address, skipping notification");
            return;
        }

        if let Err(error) = self.sender.send(message) {
            tracing::warn!(subject = %error.0.subject, "notification dispatcher is gone, dropping email");
        }
    }
}

pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    retry: RetryPolicy,
}

/// SMTP delivery when enabled, otherwise messages only reach the log.
pub fn mailer_from_config(config: &NotificationConfig) -> Result<Arc<dyn Mailer>, AppError> {
    if config.enable_email_notifications {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        Ok(Arc::new(LogMailer))
    }
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, retry: RetryPolicy) -> Self {
        Self { mailer, retry }
    }

    pub fn spawn(self, receiver: UnboundedReceiver<EmailMessage>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    /// Delivers queued messages until every outbox handle is dropped.
    pub async fn run(self, mut receiver: UnboundedReceiver<EmailMessage>) {
        while let Some(message) = receiver.recv().await {
            self.deliver(message).await;
        }
        tracing::debug!("notification outbox closed");
    }

    pub async fn deliver(&self, message: EmailMessage) {
        let message = Arc::new(message);
        let mailer = self.mailer.clone();
        let pending = message.clone();

        let result = retry_with_backoff(&self.retry, move || {
            let mailer = mailer.clone();
            let message = pending.clone();
            Box::pin(async move { mailer.send(&message).await })
        })
        .await;

        match result {
            Ok(()) => tracing::info!(to = %message.to, subject = %message.subject, "email delivered"),
            Err(error) => tracing::error!(
                to = %message.to,
                subject = %message.subject,
                %error,
                attempts = self.retry.max_attempts,
                "email delivery failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` sends, then records what it delivers.
    struct FlakyMailer {
        failures: u32,
        calls: AtomicU32,
        sent: Mutex<Vec<EmailMessage>>,
    }

    impl FlakyMailer {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(MailError::Transport("connection reset".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 2.0,
        }
    }

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Welcome to MentorHub".to_string(),
            body: "see you there".to_string(),
        }
    }

    #[tokio::test]
    async fn dispatcher_retries_until_delivered() {
        let mailer = Arc::new(FlakyMailer::new(2));
        let dispatcher = NotificationDispatcher::new(mailer.clone(), fast_retry());

        dispatcher.deliver(message("mia@example.com")).await;

        assert_eq!(mailer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dispatcher_gives_up_quietly() {
        let mailer = Arc::new(FlakyMailer::new(10));
        let dispatcher = NotificationDispatcher::new(mailer.clone(), fast_retry());

        dispatcher.deliver(message("mia@example.com")).await;

        assert_eq!(mailer.calls.load(Ordering::SeqCst), 3);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn outbox_skips_missing_recipients_and_drains_in_order() {
        let mailer = Arc::new(FlakyMailer::new(0));
        let (outbox, receiver) = NotificationOutbox::channel();
        let handle = NotificationDispatcher::new(mailer.clone(), fast_retry()).spawn(receiver);

        outbox.enqueue(message("first@example.com"));
        outbox.enqueue(message("  "));
        outbox.enqueue(message("second@example.com"));
        drop(outbox);
        handle.await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        let recipients: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
        assert_eq!(recipients, vec!["first@example.com", "second@example.com"]);
    }

    #[test]
    fn disabled_config_logs_instead_of_sending() {
        assert!(mailer_from_config(&NotificationConfig::default()).is_ok());
    }
}
