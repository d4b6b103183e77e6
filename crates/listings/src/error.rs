use actix_web::{HttpResponse, ResponseError};

/// Errors raised by listing, review and saved-listing operations.
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    /// No listing with this id
    #[error("Listing not found")]
    NotFound,

    /// The caller does not own the listing
    #[error("You do not own this listing")]
    NotOwner,

    /// Owners cannot review their own listing
    #[error("You cannot rate your own listing")]
    OwnListing,

    /// The caller has no review on this listing
    #[error("Review not found")]
    ReviewNotFound,

    /// Request data failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for ListingError {
    fn from(err: validator::ValidationErrors) -> Self {
        ListingError::Validation(err.to_string())
    }
}

impl ResponseError for ListingError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ListingError::NotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "listing_not_found",
                "message": "Listing not found"
            })),
            ListingError::NotOwner => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "not_owner",
                "message": "You do not own this listing"
            })),
            ListingError::OwnListing => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "own_listing",
                "message": "You cannot rate your own listing"
            })),
            ListingError::ReviewNotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "review_not_found",
                "message": "You haven't rated this listing"
            })),
            ListingError::Validation(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "validation_error",
                "message": msg
            })),
            ListingError::Database(e) => {
                log::error!("❌ Listing database error: {}", e);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "internal_error",
                    "message": "An internal error occurred"
                }))
            }
        }
    }
}
