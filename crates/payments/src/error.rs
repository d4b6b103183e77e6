use actix_web::{HttpResponse, ResponseError};

/// Errors raised by checkout and settlement.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// No booking with this id, or it belongs to someone else
    #[error("Booking not found")]
    BookingNotFound,

    /// No checkout session with this id
    #[error("Checkout session not found")]
    SessionNotFound,

    /// The caller's role may not perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The booking is not in a payable state
    #[error("Booking cannot be paid: {0}")]
    NotPayable(String),

    /// The booking was already paid
    #[error("Booking is already paid")]
    AlreadyPaid,

    /// The listing owner has no connected account
    #[error("The landowner has not connected a payout account")]
    OwnerNotConnected,

    /// The owner's connected account cannot receive transfers yet
    #[error("The landowner's payout account cannot receive transfers yet")]
    OwnerTransfersInactive,

    /// Connected account ids look like `acct_...`
    #[error("Invalid connected account id")]
    InvalidAccountId,

    /// Checkout session ids look like `cs_...`
    #[error("Invalid checkout session id")]
    InvalidSessionId,

    /// Checkout has not been paid
    #[error("Payment not completed")]
    PaymentNotCompleted,

    /// Missing or invalid webhook signature
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Webhook body could not be understood
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// The payment provider failed or rejected the request
    #[error("Payment provider error: {0}")]
    Gateway(String),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ResponseError for PaymentError {
    fn error_response(&self) -> HttpResponse {
        let message = self.to_string();
        match self {
            PaymentError::BookingNotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "booking_not_found",
                "message": message
            })),
            PaymentError::SessionNotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "session_not_found",
                "message": message
            })),
            PaymentError::Forbidden(_) => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "forbidden",
                "message": message
            })),
            PaymentError::NotPayable(_) => HttpResponse::Conflict().json(serde_json::json!({
                "error": "not_payable",
                "message": message
            })),
            PaymentError::AlreadyPaid => HttpResponse::Conflict().json(serde_json::json!({
                "error": "already_paid",
                "message": message
            })),
            PaymentError::OwnerNotConnected => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "owner_not_connected",
                "message": message
            })),
            PaymentError::OwnerTransfersInactive => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "owner_transfers_inactive",
                    "message": message
                }))
            }
            PaymentError::InvalidAccountId => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid_account_id",
                "message": message
            })),
            PaymentError::InvalidSessionId => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid_session_id",
                "message": message
            })),
            PaymentError::PaymentNotCompleted => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "payment_not_completed",
                    "message": message
                }))
            }
            PaymentError::InvalidSignature(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "invalid_signature",
                    "message": message
                }))
            }
            PaymentError::InvalidPayload(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid_payload",
                "message": message
            })),
            PaymentError::Gateway(e) => {
                log::error!("❌ Payment provider error: {}", e);
                HttpResponse::BadGateway().json(serde_json::json!({
                    "error": "payment_provider_error",
                    "message": "The payment provider could not process the request"
                }))
            }
            PaymentError::Database(e) => {
                log::error!("❌ Payment database error: {}", e);
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
            PaymentError::InvalidSignature("stale".into())
                .error_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PaymentError::AlreadyPaid.error_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            PaymentError::Gateway("timeout".into())
                .error_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
