use std::sync::Mutex;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ses::Client as SesClient;
use uuid::Uuid;

use crate::types::{NotificationError, OutgoingEmail};

/// Something that can deliver a rendered email and return the provider's message id.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Delivers the email.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, NotificationError>;
}

/// AWS SES email transport.
#[derive(Debug, Clone)]
pub struct SesTransport {
    ses_client: SesClient,
}

impl SesTransport {
    /// Creates a transport from the ambient AWS configuration.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self {
            ses_client: SesClient::new(&config),
        }
    }
}

#[async_trait]
impl EmailTransport for SesTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, NotificationError> {
        let subject_content = aws_sdk_ses::types::Content::builder()
            .data(&email.subject)
            .build()
            .map_err(|e| {
                log::error!("❌ Failed to build subject content: {}", e);
                NotificationError::SesError(format!("Failed to build subject: {}", e))
            })?;

        let html_content = aws_sdk_ses::types::Content::builder()
            .data(&email.html_body)
            .build()
            .map_err(|e| {
                log::error!("❌ Failed to build HTML content: {}", e);
                NotificationError::SesError(format!("Failed to build HTML body: {}", e))
            })?;

        let text_content = aws_sdk_ses::types::Content::builder()
            .data(&email.text_body)
            .build()
            .map_err(|e| {
                log::error!("❌ Failed to build text content: {}", e);
                NotificationError::SesError(format!("Failed to build text body: {}", e))
            })?;

        let body = aws_sdk_ses::types::Body::builder()
            .html(html_content)
            .text(text_content)
            .build();

        let message = aws_sdk_ses::types::Message::builder()
            .subject(subject_content)
            .body(body)
            .build();

        let destination = aws_sdk_ses::types::Destination::builder()
            .to_addresses(&email.to)
            .build();

        let result = self
            .ses_client
            .send_email()
            .source(&email.from)
            .destination(destination)
            .message(message)
            .send()
            .await;

        match result {
            Ok(output) => {
                let message_id = output.message_id().to_string();
                log::info!("📧 SES accepted '{}' for {} ({})", email.subject, email.to, message_id);
                Ok(message_id)
            }
            Err(e) => {
                log::error!("❌ AWS SES error: {:#?}", e);
                let error_msg = if let Some(service_error) = e.as_service_error() {
                    format!("AWS SES service error: {:?}", service_error)
                } else {
                    format!("AWS SES error: {}", e)
                };
                Err(NotificationError::SesError(error_msg))
            }
        }
    }
}

/// Development transport that writes emails to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, NotificationError> {
        log::info!(
            "📧 [log transport] To: {} | Subject: {}\n{}",
            email.to,
            email.subject,
            email.text_body
        );
        Ok(format!("log-{}", Uuid::new_v4()))
    }
}

/// Transport that keeps every email in memory. Used by tests.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: bool,
}

impl MemoryTransport {
    /// A transport that records emails.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every send fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl EmailTransport for MemoryTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, NotificationError> {
        if self.fail {
            return Err(NotificationError::SesError("delivery disabled".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sent.push(email.clone());
        Ok(format!("memory-{}", sent.len()))
    }
}
