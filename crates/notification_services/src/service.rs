use std::sync::Arc;

use crate::templates::{self, escape_html, layout, render};
use crate::transport::{EmailTransport, LogTransport, SesTransport};
use crate::types::{NotificationError, OutgoingEmail};

/// Minutes an account verification or password-reset code stays valid.
pub const ACCOUNT_CODE_TTL_MINUTES: i64 = 15;

/// Notification service for sending transactional emails.
#[derive(Clone)]
pub struct NotificationService {
    transport: Arc<dyn EmailTransport>,
    from_email: String,
    app_name: String,
    contact_email: String,
}

impl NotificationService {
    /// Creates the service from the environment.
    ///
    /// `EMAIL_TRANSPORT` selects `ses` (default) or `log`; `FROM_EMAIL`,
    /// `APP_NAME` and `CONTACT_EMAIL` fill in addresses and branding.
    pub async fn new() -> Result<Self, NotificationError> {
        let transport: Arc<dyn EmailTransport> =
            match std::env::var("EMAIL_TRANSPORT").as_deref() {
                Ok("log") => Arc::new(LogTransport),
                Ok("ses") | Err(_) => Arc::new(SesTransport::from_env().await),
                Ok(other) => {
                    return Err(NotificationError::Configuration(format!(
                        "unknown EMAIL_TRANSPORT '{}'",
                        other
                    )));
                }
            };

        let from_email =
            std::env::var("FROM_EMAIL").unwrap_or_else(|_| "hello@rvnbo.com".to_string());
        let app_name = std::env::var("APP_NAME").unwrap_or_else(|_| "RVnBo.com".to_string());
        let contact_email =
            std::env::var("CONTACT_EMAIL").unwrap_or_else(|_| from_email.clone());

        Ok(Self::with_transport(
            transport,
            from_email,
            app_name,
            contact_email,
        ))
    }

    /// Creates the service over an explicit transport.
    pub fn with_transport(
        transport: Arc<dyn EmailTransport>,
        from_email: impl Into<String>,
        app_name: impl Into<String>,
        contact_email: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            from_email: from_email.into(),
            app_name: app_name.into(),
            contact_email: contact_email.into(),
        }
    }

    async fn deliver(
        &self,
        to: &str,
        subject: &str,
        title: &str,
        content_html: &str,
        text_body: String,
    ) -> Result<(), NotificationError> {
        if !to.contains('@') {
            return Err(NotificationError::InvalidEmail);
        }

        let email = OutgoingEmail {
            from: self.from_email.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: layout(&self.app_name, title, content_html),
            text_body,
        };

        let id = self.transport.send(&email).await?;
        log::info!("✅ '{}' sent to {} ({})", subject, to, id);
        Ok(())
    }

    /// Sends the account email-verification code issued at signup.
    pub async fn send_account_verification_code(
        &self,
        email: &str,
        name: &str,
        code: &str,
    ) -> Result<(), NotificationError> {
        let minutes = ACCOUNT_CODE_TTL_MINUTES.to_string();
        let content = render(
            templates::ACCOUNT_VERIFICATION_CONTENT,
            &[("name", &escape_html(name)), ("code", code), ("minutes", &minutes)],
        );
        let text = format!(
            "Hi {}!\n\nYour {} verification code is: {}\n\nThis code expires in {} minutes.",
            name, self.app_name, code, minutes
        );
        self.deliver(email, "Verify Your Email", "Verify Your Email", &content, text)
            .await
    }

    /// Sends the welcome email after a successful email verification.
    pub async fn send_welcome_email(&self, email: &str, name: &str) -> Result<(), NotificationError> {
        let content = render(
            templates::WELCOME_CONTENT,
            &[("name", &escape_html(name)), ("app_name", &self.app_name)],
        );
        let subject = format!("Welcome to {}", self.app_name);
        let text = format!(
            "Dear {},\n\nWelcome to {}! Your account is ready.",
            name, self.app_name
        );
        self.deliver(email, &subject, "Welcome!", &content, text).await
    }

    /// Sends a password-reset code.
    pub async fn send_password_reset_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<(), NotificationError> {
        let minutes = ACCOUNT_CODE_TTL_MINUTES.to_string();
        let content = render(
            templates::PASSWORD_RESET_CONTENT,
            &[("code", code), ("minutes", &minutes)],
        );
        let text = format!(
            "Your password reset code is: {}\n\nThis code expires in {} minutes.",
            code, minutes
        );
        self.deliver(
            email,
            "Password Reset Verification Code",
            "Password Reset",
            &content,
            text,
        )
        .await
    }

    /// Confirms a completed password reset.
    pub async fn send_password_reset_success(&self, email: &str) -> Result<(), NotificationError> {
        self.deliver(
            email,
            "Password Reset Successful",
            "Password Reset Successful",
            templates::PASSWORD_RESET_SUCCESS_CONTENT,
            "Your password has been reset successfully.".to_string(),
        )
        .await
    }

    /// Sends the code a traveler must enter to confirm a pending booking.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_booking_verification_code(
        &self,
        email: &str,
        name: &str,
        spot: &str,
        check_in: &str,
        check_out: &str,
        code: &str,
        expires_in_minutes: i64,
    ) -> Result<(), NotificationError> {
        let minutes = expires_in_minutes.to_string();
        let content = render(
            templates::BOOKING_VERIFICATION_CONTENT,
            &[
                ("name", &escape_html(name)),
                ("spot", &escape_html(spot)),
                ("check_in", check_in),
                ("check_out", check_out),
                ("code", code),
                ("minutes", &minutes),
            ],
        );
        let text = format!(
            "Hello {},\n\nYour booking verification code for {} ({} to {}) is: {}\n\nIt expires in {} minutes.",
            name, spot, check_in, check_out, code, minutes
        );
        self.deliver(
            email,
            "Booking Verification Code",
            "Confirm Your Booking",
            &content,
            text,
        )
        .await
    }

    /// Tells the traveler their booking is confirmed and ready for payment.
    pub async fn send_booking_confirmation(
        &self,
        email: &str,
        name: &str,
        spot: &str,
        check_in: &str,
        check_out: &str,
    ) -> Result<(), NotificationError> {
        let content = render(
            templates::BOOKING_CONFIRMED_CONTENT,
            &[
                ("name", &escape_html(name)),
                ("spot", &escape_html(spot)),
                ("check_in", check_in),
                ("check_out", check_out),
            ],
        );
        let text = format!(
            "Hello {},\n\nYour booking at {} from {} to {} is confirmed.",
            name, spot, check_in, check_out
        );
        self.deliver(email, "Booking Confirmed", "Booking Confirmed", &content, text)
            .await
    }

    /// Relays a contact-form submission to the operator's inbox.
    pub async fn send_contact_form(
        &self,
        from_name: &str,
        from_email: &str,
        subject: &str,
        message: &str,
    ) -> Result<(), NotificationError> {
        let content = render(
            templates::CONTACT_FORM_CONTENT,
            &[
                ("name", &escape_html(from_name)),
                ("email", &escape_html(from_email)),
                ("subject", &escape_html(subject)),
                ("message", &escape_html(message)),
            ],
        );
        let text = format!(
            "From: {} <{}>\nSubject: {}\n\n{}",
            from_name, from_email, subject, message
        );
        let contact_email = self.contact_email.clone();
        self.deliver(
            &contact_email,
            &format!("Contact Form: {}", subject),
            "New Contact Form Message",
            &content,
            text,
        )
        .await
    }

    /// Generates a random 6-digit verification code.
    pub fn generate_verification_code() -> String {
        use rand::Rng;
        let mut rng = rand::rng();
        format!("{:06}", rng.random_range(100000..=999999))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn service(transport: Arc<MemoryTransport>) -> NotificationService {
        NotificationService::with_transport(
            transport,
            "noreply@rvnbo.com",
            "RVnBo.com",
            "ops@rvnbo.com",
        )
    }

    #[test]
    fn test_generate_verification_code_is_six_digits() {
        for _ in 0..50 {
            let code = NotificationService::generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_booking_code_email_carries_code_and_dates() {
        let transport = Arc::new(MemoryTransport::new());
        let notifications = service(transport.clone());

        notifications
            .send_booking_verification_code(
                "traveler@example.com",
                "Sam",
                "Lakeside Pad",
                "2025-07-01",
                "2025-07-04",
                "482913",
                10,
            )
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "traveler@example.com");
        assert_eq!(sent[0].from, "noreply@rvnbo.com");
        assert!(sent[0].html_body.contains("482913"));
        assert!(sent[0].html_body.contains("2025-07-01"));
        assert!(sent[0].text_body.contains("482913"));
    }

    #[tokio::test]
    async fn test_contact_form_goes_to_operator_and_is_escaped() {
        let transport = Arc::new(MemoryTransport::new());
        let notifications = service(transport.clone());

        notifications
            .send_contact_form("Eve", "eve@example.com", "Hi", "<b>bold</b>")
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].to, "ops@rvnbo.com");
        assert_eq!(sent[0].subject, "Contact Form: Hi");
        assert!(sent[0].html_body.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!sent[0].html_body.contains("<b>bold</b>"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected() {
        let transport = Arc::new(MemoryTransport::new());
        let notifications = service(transport.clone());

        let err = notifications
            .send_welcome_email("not-an-email", "Sam")
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::InvalidEmail));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let notifications = service(Arc::new(MemoryTransport::failing()));
        let result = notifications
            .send_password_reset_code("a@b.com", "123456")
            .await;
        assert!(matches!(result, Err(NotificationError::SesError(_))));
    }
}
