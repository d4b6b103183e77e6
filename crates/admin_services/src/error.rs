use actix_web::{HttpResponse, ResponseError};

/// Errors raised by admin and dashboard operations.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// No user with this id
    #[error("User not found")]
    UserNotFound,

    /// Admin accounts cannot be suspended or deleted through moderation
    #[error("Admin accounts cannot be modified here")]
    ProtectedAccount,

    /// Unknown website page
    #[error("Unknown content page '{0}'")]
    UnknownContent(String),

    /// The page has not been written yet
    #[error("Content not found")]
    ContentNotFound,

    /// Request data failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for AdminError {
    fn from(err: validator::ValidationErrors) -> Self {
        AdminError::Validation(err.to_string())
    }
}

impl ResponseError for AdminError {
    fn error_response(&self) -> HttpResponse {
        let message = self.to_string();
        match self {
            AdminError::UserNotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "user_not_found",
                "message": message
            })),
            AdminError::ProtectedAccount => HttpResponse::Forbidden().json(serde_json::json!({
                "error": "protected_account",
                "message": message
            })),
            AdminError::UnknownContent(_) | AdminError::ContentNotFound => {
                HttpResponse::NotFound().json(serde_json::json!({
                    "error": "content_not_found",
                    "message": message
                }))
            }
            AdminError::Validation(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "validation_error",
                "message": msg
            })),
            AdminError::Database(e) => {
                log::error!("❌ Admin database error: {}", e);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "internal_error",
                    "message": "An internal error occurred"
                }))
            }
        }
    }
}
