use actix_web::{Error, HttpRequest, HttpResponse, web};
use actix_ws::{Closed, Message as WsMessage, Session};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use auth_services::jwt::JwtService;
use auth_services::middleware::bearer_token;
use auth_services::service::AuthService;
use messaging::{ChatHub, ClientEvent, MessageService, SendMessageRequest, ServerEvent};

/// Query string of the socket upgrade.
#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    /// Access token, for clients that cannot set headers on upgrade
    pub token: Option<String>,
}

fn unauthorized(code: &str, message: &str) -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({
        "error": code,
        "message": message
    }))
}

/// Upgrades to the chat socket after authenticating the access token.
pub async fn chat_socket(
    req: HttpRequest,
    body: web::Payload,
    query: web::Query<SocketQuery>,
    pool: web::Data<PgPool>,
    jwt_service: web::Data<JwtService>,
    hub: web::Data<ChatHub>,
) -> Result<HttpResponse, Error> {
    let token = bearer_token(req.headers()).or_else(|| {
        query
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    });
    let Some(token) = token else {
        return Ok(unauthorized("missing_token", "Authorization token is required"));
    };

    let Ok(user_id) = jwt_service.extract_user_id_from_token(&token) else {
        return Ok(unauthorized("invalid_token", "Invalid or expired token"));
    };

    let user = AuthService::new(pool.get_ref().clone())
        .get_user_by_id(&user_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let Some(user) = user.filter(|u| u.is_active) else {
        return Ok(unauthorized("user_not_found", "No active account for this token"));
    };

    let (response, session, msg_stream) = actix_ws::handle(&req, body)?;

    let hub = hub.get_ref().clone();
    let service = MessageService::new(pool.get_ref().clone());
    actix_web::rt::spawn(run_connection(user.id, session, msg_stream, hub, service));

    Ok(response)
}

async fn run_connection(
    user_id: Uuid,
    mut session: Session,
    mut msg_stream: actix_ws::MessageStream,
    hub: ChatHub,
    service: MessageService,
) {
    let (connection_id, mut rx, first) = hub.register(user_id);
    if first {
        if let Err(e) = service.set_online(&user_id).await {
            error!("❌ Failed to mark {} online: {}", user_id, e);
        }
    }
    hub.broadcast_online_users();
    info!("💬 Chat connected: {} ({})", user_id, connection_id);

    let close_reason = loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    if session.text(event.to_frame()).await.is_err() {
                        break None;
                    }
                }
                None => break None,
            },
            frame = msg_stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if handle_client_frame(&text, &user_id, &service, &hub, &mut session)
                        .await
                        .is_err()
                    {
                        break None;
                    }
                }
                Some(Ok(WsMessage::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break None;
                    }
                }
                Some(Ok(WsMessage::Close(reason))) => break reason,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("⚠️ Chat protocol error for {}: {}", user_id, e);
                    break None;
                }
                None => break None,
            },
        }
    };

    let _ = session.close(close_reason).await;

    if hub.unregister(&user_id, connection_id) {
        mark_offline(&hub, &service, &user_id).await;
    }
    hub.broadcast_online_users();
    info!("💬 Chat disconnected: {} ({})", user_id, connection_id);
}

/// Persists the offline flag after the last connection closed. A connection
/// opened while the write was in flight restores the online flag.
async fn mark_offline(hub: &ChatHub, service: &MessageService, user_id: &Uuid) {
    if hub.is_online(user_id) {
        return;
    }
    if let Err(e) = service.set_offline(user_id).await {
        error!("❌ Failed to mark {} offline: {}", user_id, e);
    }
    if hub.is_online(user_id) {
        debug!("{} reconnected while going offline", user_id);
        if let Err(e) = service.set_online(user_id).await {
            error!("❌ Failed to mark {} online: {}", user_id, e);
        }
    }
}

async fn handle_client_frame(
    text: &str,
    user_id: &Uuid,
    service: &MessageService,
    hub: &ChatHub,
    session: &mut Session,
) -> Result<(), Closed> {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("Unreadable chat frame from {}: {}", user_id, e);
            let reply = ServerEvent::MessageError {
                error: format!("Unrecognized event: {}", e),
            };
            return session.text(reply.to_frame()).await;
        }
    };

    match event {
        ClientEvent::SendMessage {
            receiver_id,
            text,
            images,
        } => {
            let request = SendMessageRequest { text, images };
            match service.send_message(user_id, &receiver_id, &request).await {
                Ok(message) => {
                    hub.deliver(&message);
                    Ok(())
                }
                Err(e) => {
                    let reply = ServerEvent::MessageError {
                        error: e.to_string(),
                    };
                    session.text(reply.to_frame()).await
                }
            }
        }
        ClientEvent::UsersList => {
            let reply = match service.chat_users(user_id).await {
                Ok(users) => ServerEvent::UsersListResponse(users),
                Err(e) => {
                    error!("❌ Failed to list chat users: {}", e);
                    ServerEvent::MessageError {
                        error: "Could not load users".to_string(),
                    }
                }
            };
            session.text(reply.to_frame()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use sqlx::postgres::PgPoolOptions;

    fn app_data() -> (web::Data<PgPool>, web::Data<JwtService>, web::Data<ChatHub>) {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/rv_marketplace_test")
            .unwrap();
        (
            web::Data::new(pool),
            web::Data::new(JwtService::with_secret("secret")),
            web::Data::new(ChatHub::new()),
        )
    }

    #[actix_web::test]
    async fn test_socket_without_token_is_unauthorized() {
        let (pool, jwt, hub) = app_data();
        let app = test::init_service(
            App::new()
                .app_data(pool)
                .app_data(jwt)
                .app_data(hub)
                .route("/ws", web::get().to(chat_socket)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/ws").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "missing_token");
    }

    #[actix_web::test]
    async fn test_socket_with_garbage_query_token_is_rejected() {
        let (pool, jwt, hub) = app_data();
        let app = test::init_service(
            App::new()
                .app_data(pool)
                .app_data(jwt)
                .app_data(hub)
                .route("/ws", web::get().to(chat_socket)),
        )
        .await;

        let req = test::TestRequest::get().uri("/ws?token=not-a-jwt").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_token");
    }

    #[actix_web::test]
    async fn test_user_with_open_connection_is_not_marked_offline() {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_lazy("postgres://localhost/rv_marketplace_test")
            .unwrap();
        let service = MessageService::new(pool);
        let hub = ChatHub::new();
        let user = Uuid::new_v4();
        let (_, _rx, _) = hub.register(user);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            mark_offline(&hub, &service, &user),
        )
        .await;

        assert!(result.is_ok());
        assert!(hub.is_online(&user));
    }
}
