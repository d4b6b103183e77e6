//! # Bookings
//!
//! Reservations of listings: pending bookings confirmed by an emailed code,
//! half-open date-range conflict detection under a per-listing lock, a
//! small status machine and a periodic sweep that releases bookings whose
//! code expired.

/// Stay ranges and conflict detection.
pub mod dates;
/// Booking error type.
pub mod error;
/// Booking lifecycle operations.
pub mod service;
/// Background cancellation of expired pending bookings.
pub mod sweeper;
/// Booking models, statuses and request types.
pub mod types;

pub use dates::{DateRange, ExistingStay, find_conflict};
pub use error::BookingError;
pub use service::{BookingService, cancel_expired_bookings};
pub use sweeper::{BookingExpirySweeper, SweeperConfig};
pub use types::*;
