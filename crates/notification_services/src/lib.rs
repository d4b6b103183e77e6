//! # Notification Services
//!
//! Transactional email for the marketplace: account verification codes,
//! password resets, booking verification codes and contact-form relays.
//! Also hosts the in-memory store for short-lived account verification codes.

/// High-level notification service composing templates and a transport.
pub mod service;
/// HTML and text templates for outgoing emails.
pub mod templates;
/// Email transports (AWS SES, logging, in-memory).
pub mod transport;
/// Types and errors used by the notification services.
pub mod types;
/// Time-boxed verification code storage.
pub mod verification;

pub use service::NotificationService;
pub use transport::{EmailTransport, LogTransport, MemoryTransport, SesTransport};
pub use types::{NotificationError, OutgoingEmail, VerificationError, VerificationStore};
pub use verification::{
    check_code, create_verification_store, purge_expired_codes, store_verification_code,
    verify_code,
};
