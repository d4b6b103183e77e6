//! # Payments
//!
//! Hosted checkout for confirmed bookings with the charge split between the
//! platform and the listing owner's connected account. Settlement happens
//! through the success redirect or the signed webhook, whichever arrives
//! first, and is recorded once in the transaction ledger.

/// Environment-driven payment settings.
pub mod config;
/// Payment error type.
pub mod error;
/// Platform fee arithmetic.
pub mod fees;
/// Checkout, settlement and ledger queries.
pub mod service;
/// Stripe REST client.
pub mod stripe;
/// Ledger and response types.
pub mod types;
/// Webhook signature verification and event parsing.
pub mod webhook;

pub use config::PaymentConfig;
pub use error::PaymentError;
pub use fees::{PaymentSplit, split_amount};
pub use service::PaymentService;
pub use stripe::{CheckoutRequest, CheckoutSession, ConnectedAccount, PaymentGateway, StripeClient};
pub use types::*;
pub use webhook::{StripeEvent, verify_signature};
