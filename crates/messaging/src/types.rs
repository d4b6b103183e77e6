use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored direct message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    /// Message id
    pub id: Uuid,
    /// Author
    pub sender_id: Uuid,
    /// Recipient
    pub receiver_id: Uuid,
    /// Text body, may be empty when images are attached
    pub text: String,
    /// Attached image URLs
    pub images: Vec<String>,
    /// Send time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Column list matching [`Message`].
pub const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, text, images, created_at, updated_at";

/// A user shown in chat lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatUser {
    /// User id
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// `traveler`, `landowner` or `admin`
    pub role: String,
    /// Profile image
    pub image: Option<String>,
    /// Whether a chat connection is open
    pub is_online: bool,
    /// When the last connection closed
    pub last_seen: Option<DateTime<Utc>>,
}

/// Column list matching [`ChatUser`].
pub const CHAT_USER_COLUMNS: &str = "id, name, email, role, image, is_online, last_seen";

/// Body of a send-message request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessageRequest {
    /// Text body
    #[serde(default)]
    pub text: Option<String>,
    /// Hosted image URLs
    #[serde(default, alias = "image")]
    pub images: Vec<String>,
}

/// Events a chat client sends.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Send a message to another user
    SendMessage {
        /// Recipient
        #[serde(alias = "receiverId")]
        receiver_id: Uuid,
        /// Text body
        #[serde(default)]
        text: Option<String>,
        /// Hosted image URLs
        #[serde(default, alias = "image")]
        images: Vec<String>,
    },
    /// Ask for the list of users one can chat with
    UsersList,
}

/// Events the server pushes to chat clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A message addressed to this user
    ReceiveMessage(Message),
    /// Echo of a message this user sent
    MessageSent(Message),
    /// A send failed
    MessageError {
        /// Why it failed
        error: String,
    },
    /// Ids of every user with an open connection
    OnlineUsers(Vec<Uuid>),
    /// Reply to [`ClientEvent::UsersList`]
    UsersListResponse(Vec<ChatUser>),
}

impl ServerEvent {
    /// JSON text frame for the socket.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("Failed to encode chat event: {}", e);
            r#"{"event":"message_error","data":{"error":"encoding failed"}}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_message_event() {
        let receiver = Uuid::new_v4();
        let event: ClientEvent = serde_json::from_value(serde_json::json!({
            "event": "send_message",
            "data": { "receiverId": receiver, "text": "Is the spot free in July?", "image": ["https://img.example.com/a.jpg"] }
        }))
        .unwrap();

        match event {
            ClientEvent::SendMessage {
                receiver_id,
                text,
                images,
            } => {
                assert_eq!(receiver_id, receiver);
                assert_eq!(text.as_deref(), Some("Is the spot free in July?"));
                assert_eq!(images.len(), 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_users_list_event() {
        let event: ClientEvent =
            serde_json::from_value(serde_json::json!({ "event": "users_list" })).unwrap();
        assert!(matches!(event, ClientEvent::UsersList));
    }

    #[test]
    fn test_server_event_frame_shape() {
        let frame = ServerEvent::MessageError {
            error: "Receiver not found".to_string(),
        }
        .to_frame();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["event"], "message_error");
        assert_eq!(value["data"]["error"], "Receiver not found");

        let online = ServerEvent::OnlineUsers(vec![Uuid::nil()]).to_frame();
        let value: serde_json::Value = serde_json::from_str(&online).unwrap();
        assert_eq!(value["event"], "online_users");
        assert_eq!(value["data"][0], Uuid::nil().to_string());
    }
}
