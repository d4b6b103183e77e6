use actix_web::{HttpResponse, ResponseError};

use crate::types::BookingStatus;

/// Errors raised by booking operations.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// No booking with this id
    #[error("Booking not found")]
    NotFound,

    /// No listing with this id
    #[error("Listing not found")]
    ListingNotFound,

    /// The listing is not accepting bookings
    #[error("Listing is not available for booking")]
    ListingUnavailable,

    /// Landowners cannot book their own spot
    #[error("You cannot book your own listing")]
    OwnListing,

    /// The caller is neither the traveler nor the listing owner
    #[error("You do not have access to this booking")]
    Forbidden,

    /// Check-in/check-out are invalid
    #[error("Invalid dates: {0}")]
    InvalidDates(String),

    /// Another blocking booking overlaps the requested stay
    #[error("The listing is already booked for some of these dates")]
    DatesUnavailable,

    /// The booking is not in a state that allows the operation
    #[error("Booking cannot change from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: &'static str,
        /// Requested state
        to: &'static str,
    },

    /// The booking is not awaiting code confirmation
    #[error("Booking is not awaiting verification")]
    NotAwaitingVerification,

    /// Wrong confirmation code
    #[error("Invalid verification code, {remaining} attempts left")]
    InvalidCode {
        /// Attempts left before the booking is cancelled
        remaining: i32,
    },

    /// The confirmation deadline passed; the booking was cancelled
    #[error("Verification code expired")]
    CodeExpired,

    /// Too many wrong codes; the booking was cancelled
    #[error("Too many verification attempts")]
    TooManyAttempts,

    /// Paid bookings cannot be cancelled
    #[error("Booking payment is {0} and it can no longer be cancelled")]
    PaymentInProgress(&'static str),

    /// Request data failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl BookingError {
    /// Error for a transition that is not allowed.
    pub fn transition(from: BookingStatus, to: BookingStatus) -> Self {
        BookingError::InvalidTransition {
            from: from.as_str(),
            to: to.as_str(),
        }
    }
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(err: validator::ValidationErrors) -> Self {
        BookingError::Validation(err.to_string())
    }
}

impl ResponseError for BookingError {
    fn error_response(&self) -> HttpResponse {
        let message = self.to_string();
        match self {
            BookingError::NotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "booking_not_found",
                "message": message
            })),
            BookingError::ListingNotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "listing_not_found",
                "message": message
            })),
            BookingError::ListingUnavailable => HttpResponse::Conflict().json(serde_json::json!({
                "error": "listing_unavailable",
                "message": message
            })),
            BookingError::OwnListing => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "own_listing",
                "message": message
            })),
            BookingError::Forbidden => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "forbidden",
                "message": message
            })),
            BookingError::InvalidDates(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid_dates",
                "message": message
            })),
            BookingError::DatesUnavailable => HttpResponse::Conflict().json(serde_json::json!({
                "error": "dates_unavailable",
                "message": message
            })),
            BookingError::InvalidTransition { .. } => {
                HttpResponse::Conflict().json(serde_json::json!({
                    "error": "invalid_transition",
                    "message": message
                }))
            }
            BookingError::NotAwaitingVerification => {
                HttpResponse::Conflict().json(serde_json::json!({
                    "error": "not_awaiting_verification",
                    "message": message
                }))
            }
            BookingError::InvalidCode { remaining } => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "invalid_code",
                    "message": message,
                    "remaining_attempts": remaining
                }))
            }
            BookingError::CodeExpired => HttpResponse::Gone().json(serde_json::json!({
                "error": "code_expired",
                "message": "Verification code expired, the booking was cancelled"
            })),
            BookingError::TooManyAttempts => HttpResponse::TooManyRequests().json(serde_json::json!({
                "error": "too_many_attempts",
                "message": "Too many wrong codes, the booking was cancelled"
            })),
            BookingError::PaymentInProgress(_) => {
                HttpResponse::Conflict().json(serde_json::json!({
                    "error": "payment_in_progress",
                    "message": message
                }))
            }
            BookingError::Validation(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "validation_error",
                "message": msg
            })),
            BookingError::Database(e) => {
                log::error!("❌ Booking database error: {}", e);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "internal_error",
                    "message": "An internal error occurred"
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            BookingError::DatesUnavailable.error_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BookingError::CodeExpired.error_response().status(),
            StatusCode::GONE
        );
        assert_eq!(
            BookingError::InvalidCode { remaining: 2 }
                .error_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BookingError::transition(BookingStatus::Completed, BookingStatus::Cancelled)
                .error_response()
                .status(),
            StatusCode::CONFLICT
        );
    }
}
