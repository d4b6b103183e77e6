use actix_web::{HttpResponse, Result, web};
use sqlx::PgPool;
use uuid::Uuid;

use auth_services::middleware::AuthenticatedUser;
use messaging::{ChatHub, MessageError, MessageService, SendMessageRequest};

/// Users the caller has talked to.
pub async fn conversation_partners(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, MessageError> {
    let service = MessageService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.conversation_partners(&user.id).await?))
}

/// Finds users to start a conversation with.
pub async fn search_chat_users(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, MessageError> {
    let service = MessageService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.search_users(&user.id, &path.into_inner()).await?))
}

/// Messages between the caller and another user, oldest first.
pub async fn get_conversation(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, MessageError> {
    let service = MessageService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.conversation(&user.id, &path.into_inner()).await?))
}

/// Stores a message and pushes it to both parties' live connections.
pub async fn send_message(
    pool: web::Data<PgPool>,
    hub: web::Data<ChatHub>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    request: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, MessageError> {
    let service = MessageService::new(pool.get_ref().clone());
    let message = service
        .send_message(&user.id, &path.into_inner(), &request)
        .await?;

    hub.deliver(&message);

    Ok(HttpResponse::Created().json(message))
}
