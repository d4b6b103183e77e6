use actix_web::{HttpResponse, ResponseError};
use log::info;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{
    CHAT_USER_COLUMNS, ChatUser, MESSAGE_COLUMNS, Message, SendMessageRequest,
};

/// Most images one message may carry.
pub const MAX_MESSAGE_IMAGES: usize = 10;
/// Longest accepted text body, in characters.
pub const MAX_MESSAGE_CHARS: usize = 5000;
/// Most users returned by a search.
pub const USER_SEARCH_LIMIT: i64 = 20;

/// Errors raised by messaging.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The receiver does not exist
    #[error("Receiver not found")]
    ReceiverNotFound,

    /// Sender and receiver are the same user
    #[error("You cannot message yourself")]
    SelfMessage,

    /// Content failed validation
    #[error("{0}")]
    Validation(String),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ResponseError for MessageError {
    fn error_response(&self) -> HttpResponse {
        match self {
            MessageError::ReceiverNotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "receiver_not_found",
                "message": self.to_string()
            })),
            MessageError::SelfMessage => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "self_message",
                "message": self.to_string()
            })),
            MessageError::Validation(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "validation_error",
                "message": msg
            })),
            MessageError::Database(e) => {
                log::error!("❌ Messaging database error: {}", e);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "internal_error",
                    "message": "An internal error occurred"
                }))
            }
        }
    }
}

/// Normalizes message content: trims text, drops blank image entries and
/// enforces the content limits.
pub fn validate_message(request: &SendMessageRequest) -> Result<(String, Vec<String>), MessageError> {
    let text = request.text.as_deref().unwrap_or("").trim().to_string();
    let images: Vec<String> = request
        .images
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect();

    if text.is_empty() && images.is_empty() {
        return Err(MessageError::Validation(
            "Message must contain either text or images".to_string(),
        ));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(MessageError::Validation(format!(
            "Message text cannot exceed {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    if images.len() > MAX_MESSAGE_IMAGES {
        return Err(MessageError::Validation(format!(
            "A message can carry at most {} images",
            MAX_MESSAGE_IMAGES
        )));
    }
    if let Some(bad) = images
        .iter()
        .position(|url| !(url.starts_with("http://") || url.starts_with("https://")))
    {
        return Err(MessageError::Validation(format!(
            "Image {} must be an http(s) URL",
            bad + 1
        )));
    }

    Ok((text, images))
}

/// Direct message persistence and chat user queries.
pub struct MessageService {
    pool: PgPool,
}

impl MessageService {
    /// Creates a new instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a message from `sender_id` to `receiver_id`.
    pub async fn send_message(
        &self,
        sender_id: &Uuid,
        receiver_id: &Uuid,
        request: &SendMessageRequest,
    ) -> Result<Message, MessageError> {
        if sender_id == receiver_id {
            return Err(MessageError::SelfMessage);
        }
        let (text, images) = validate_message(request)?;

        let receiver_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(receiver_id)
                .fetch_one(&self.pool)
                .await?;
        if !receiver_exists {
            return Err(MessageError::ReceiverNotFound);
        }

        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (sender_id, receiver_id, text, images) \
             VALUES ($1, $2, $3, $4) RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(sender_id)
        .bind(receiver_id)
        .bind(&text)
        .bind(&images)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    /// Messages exchanged between two users, oldest first.
    pub async fn conversation(&self, me: &Uuid, other: &Uuid) -> Result<Vec<Message>, MessageError> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY created_at ASC"
        ))
        .bind(me)
        .bind(other)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Users the caller has exchanged messages with, most recent first.
    pub async fn conversation_partners(&self, me: &Uuid) -> Result<Vec<ChatUser>, MessageError> {
        let users = sqlx::query_as::<_, ChatUser>(&format!(
            r#"
            SELECT {CHAT_USER_COLUMNS} FROM users u
            JOIN (
                SELECT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS partner_id,
                       MAX(created_at) AS last_message_at
                FROM messages
                WHERE sender_id = $1 OR receiver_id = $1
                GROUP BY 1
            ) p ON p.partner_id = u.id
            ORDER BY p.last_message_at DESC
            "#
        ))
        .bind(me)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Active users other than the caller whose name or email contains
    /// `query`.
    pub async fn search_users(&self, me: &Uuid, query: &str) -> Result<Vec<ChatUser>, MessageError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!(
            "%{}%",
            query
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );

        let users = sqlx::query_as::<_, ChatUser>(&format!(
            "SELECT {CHAT_USER_COLUMNS} FROM users \
             WHERE id <> $1 AND is_active AND (name ILIKE $2 OR email ILIKE $2) \
             ORDER BY name ASC LIMIT $3"
        ))
        .bind(me)
        .bind(&pattern)
        .bind(USER_SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Every active user except the caller.
    pub async fn chat_users(&self, me: &Uuid) -> Result<Vec<ChatUser>, MessageError> {
        let users = sqlx::query_as::<_, ChatUser>(&format!(
            "SELECT {CHAT_USER_COLUMNS} FROM users WHERE id <> $1 AND is_active ORDER BY name ASC"
        ))
        .bind(me)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Marks the user online.
    pub async fn set_online(&self, user_id: &Uuid) -> Result<(), MessageError> {
        sqlx::query("UPDATE users SET is_online = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        info!("User {} is online", user_id);
        Ok(())
    }

    /// Marks the user offline and records when they were last seen.
    pub async fn set_offline(&self, user_id: &Uuid) -> Result<(), MessageError> {
        sqlx::query("UPDATE users SET is_online = FALSE, last_seen = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        info!("User {} is offline", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: Option<&str>, images: &[&str]) -> SendMessageRequest {
        SendMessageRequest {
            text: text.map(str::to_string),
            images: images.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_text_only_message() {
        let (text, images) = validate_message(&request(Some("  Hi there  "), &[])).unwrap();
        assert_eq!(text, "Hi there");
        assert!(images.is_empty());
    }

    #[test]
    fn test_image_only_message() {
        let (text, images) =
            validate_message(&request(None, &["https://img.example.com/pad.jpg", " "])).unwrap();
        assert_eq!(text, "");
        assert_eq!(images, vec!["https://img.example.com/pad.jpg"]);
    }

    #[test]
    fn test_empty_message_is_rejected() {
        assert!(matches!(
            validate_message(&request(Some("   "), &[])),
            Err(MessageError::Validation(_))
        ));
    }

    #[test]
    fn test_limits() {
        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(validate_message(&request(Some(&long), &[])).is_err());

        let exact = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(validate_message(&request(Some(&exact), &[])).is_ok());

        let many = vec!["https://img.example.com/x.jpg"; MAX_MESSAGE_IMAGES + 1];
        assert!(validate_message(&request(Some("hi"), &many)).is_err());
    }

    #[test]
    fn test_non_http_image_is_rejected() {
        let result = validate_message(&request(None, &["data:image/png;base64,AAAA"]));
        match result {
            Err(MessageError::Validation(msg)) => assert!(msg.contains("Image 1")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
