use actix_web::{Error, HttpResponse, Result, web};
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use admin_services::{AdminError, ContentKind, ContentService};
use auth_services::middleware::AuthenticatedUser;
use auth_services::service::AuthService;
use auth_services::types::AuthError;
use notification_services::NotificationService;

/// Body of a contact-form submission.
#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    /// Sender's name
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    /// Subject line
    #[validate(length(min = 1, max = 200, message = "Subject must be 1-200 characters"))]
    pub subject: String,
    /// Message body
    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub message: String,
}

/// Public read of an editable page, addressed by slug.
pub async fn get_content(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AdminError> {
    let kind = ContentKind::from_slug(&path.into_inner())?;
    let service = ContentService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.get(kind).await?))
}

/// Relays a signed-in user's message to the operator's inbox.
pub async fn submit_contact_form(
    pool: web::Data<PgPool>,
    notifications: web::Data<NotificationService>,
    user: AuthenticatedUser,
    request: web::Json<ContactRequest>,
) -> Result<HttpResponse, Error> {
    request.validate().map_err(AuthError::from)?;

    let sender = AuthService::new(pool.get_ref().clone())
        .get_user_by_id(&user.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    notifications
        .send_contact_form(
            request.name.trim(),
            &sender.email,
            request.subject.trim(),
            request.message.trim(),
        )
        .await?;

    log::info!("📨 Contact form submitted by {}", sender.email);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Your message has been sent"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_request_requires_all_fields() {
        let request: ContactRequest = serde_json::from_value(serde_json::json!({
            "name": "Dana",
            "subject": "",
            "message": "Do you list spots in Utah?"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }
}
