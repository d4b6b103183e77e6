use actix_web::{HttpResponse, Result, web};
use sqlx::PgPool;
use validator::Validate;

use auth_services::middleware::AuthenticatedUser;
use auth_services::service::AuthService;
use auth_services::types::*;

/// Returns the signed-in user's profile.
pub async fn get_profile(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AuthError> {
    let auth_service = AuthService::new(pool.get_ref().clone());

    let user = auth_service
        .get_user_by_id(&user.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(HttpResponse::Ok().json(UserInfo::from(user)))
}

/// Applies a partial profile update.
pub async fn update_profile(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    request: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AuthError> {
    request.validate()?;

    let auth_service = AuthService::new(pool.get_ref().clone());
    let updated_user = auth_service.update_user_profile(&user.id, &request).await?;

    Ok(HttpResponse::Ok().json(UserInfo::from(updated_user)))
}

/// Changes the password after checking the current one.
pub async fn change_password(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    request: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AuthError> {
    request.validate()?;

    let auth_service = AuthService::new(pool.get_ref().clone());
    auth_service
        .change_password(&user.id, &request.current_password, &request.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Password changed successfully")))
}
