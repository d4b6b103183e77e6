use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Errors raised while composing or delivering notifications.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Simple email service (SES) errors.
    #[error("AWS SES error: {0}")]
    SesError(String),

    /// The transport could not be configured.
    #[error("Email transport configuration error: {0}")]
    Configuration(String),

    /// Invalid email format.
    #[error("Invalid email format")]
    InvalidEmail,
}

impl actix_web::ResponseError for NotificationError {
    fn error_response(&self) -> actix_web::HttpResponse {
        use actix_web::HttpResponse;

        match self {
            NotificationError::InvalidEmail => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid_email",
                "message": self.to_string()
            })),
            NotificationError::SesError(e) | NotificationError::Configuration(e) => {
                log::error!("❌ Email delivery failed: {}", e);
                HttpResponse::BadGateway().json(serde_json::json!({
                    "error": "email_delivery_failed",
                    "message": "The message could not be sent, please try again later"
                }))
            }
        }
    }
}

/// Errors raised when checking a stored verification code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// No code was issued for this key, or it was already used.
    #[error("Verification code not found")]
    NotFound,

    /// The code exists but its deadline has passed.
    #[error("Verification code has expired")]
    Expired,

    /// The code was guessed wrong too many times and has been discarded.
    #[error("Too many verification attempts")]
    TooManyAttempts,
}

/// Represents a verification code for account actions like email verification
/// or password resets.
#[derive(Clone, Debug)]
pub struct VerificationCode {
    /// The verification code itself, a 6-digit number.
    pub code: String,
    /// The expiration time of the verification code.
    pub expires_at: DateTime<Utc>,
    /// The number of attempts made to verify this code.
    pub attempts: u32,
}

/// A fully rendered email ready to hand to a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
    /// Plain-text alternative body.
    pub text_body: String,
}

/// A thread-safe store for verification codes, allowing concurrent access.
pub type VerificationStore = Arc<Mutex<HashMap<String, VerificationCode>>>;
