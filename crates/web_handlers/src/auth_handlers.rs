use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use actix_web::{HttpResponse, Result, web};
use log::warn;
use serde::Serialize;
use sqlx::PgPool;
use validator::Validate;

use auth_services::jwt::{ACCESS_TOKEN_TTL_HOURS, JwtService};
use auth_services::middleware::{ACCESS_TOKEN_COOKIE, AuthenticatedUser};
use auth_services::service::{AuthService, ensure_can_sign_in};
use auth_services::types::*;
use notification_services::service::ACCOUNT_CODE_TTL_MINUTES;
use notification_services::verification::{email_verification_key, password_reset_key};
use notification_services::{
    NotificationService, VerificationStore, check_code, store_verification_code, verify_code,
};

/// Reply to a request that (re)issued an emailed code.
#[derive(Debug, Serialize)]
pub struct CodeSentResponse {
    /// What the user should do next
    pub message: String,
    /// Whether the email was handed to the provider
    pub email_sent: bool,
}

fn access_cookie(token: &str) -> Cookie<'static> {
    Cookie::build(ACCESS_TOKEN_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::hours(ACCESS_TOKEN_TTL_HOURS))
        .finish()
}

fn session_response(session: AuthResponse) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(access_cookie(&session.access_token))
        .json(session)
}

/// Creates an unverified traveler or landowner account and emails the
/// verification code. Delivery failure does not fail the signup.
pub async fn signup(
    pool: web::Data<PgPool>,
    notification_service: web::Data<NotificationService>,
    verification_store: web::Data<VerificationStore>,
    request: web::Json<SignUpRequest>,
) -> Result<HttpResponse, AuthError> {
    request.validate()?;

    let auth_service = AuthService::new(pool.get_ref().clone());
    let user = auth_service.create_user(&request).await?;

    let code = NotificationService::generate_verification_code();
    store_verification_code(
        &verification_store,
        &email_verification_key(&user.email),
        &code,
        ACCOUNT_CODE_TTL_MINUTES,
    );

    let email_sent = match notification_service
        .send_account_verification_code(&user.email, &user.name, &code)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to send verification email during signup: {}", e);
            false
        }
    };

    Ok(HttpResponse::Created().json(SignUpResponse {
        message: "Account created. Check your email for the verification code.".to_string(),
        email_sent,
        user: UserInfo::from(user),
    }))
}

/// Confirms the account email with the emailed code and signs the user in.
pub async fn verify_email(
    pool: web::Data<PgPool>,
    jwt_service: web::Data<JwtService>,
    notification_service: web::Data<NotificationService>,
    verification_store: web::Data<VerificationStore>,
    request: web::Json<VerifyEmailRequest>,
) -> Result<HttpResponse, AuthError> {
    request.validate()?;

    let auth_service = AuthService::new(pool.get_ref().clone());
    let user = auth_service
        .get_user_by_email(&request.email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if user.email_verified {
        return Err(AuthError::AlreadyVerified);
    }

    if !verify_code(
        &verification_store,
        &email_verification_key(&user.email),
        &request.code,
    )? {
        return Err(AuthError::InvalidCode);
    }

    let user = auth_service.mark_email_verified(&user.id).await?;

    if let Err(e) = notification_service
        .send_welcome_email(&user.email, &user.name)
        .await
    {
        warn!("Failed to send welcome email to {}: {}", user.email, e);
    }

    ensure_can_sign_in(&user)?;
    let session = auth_service.issue_session(&jwt_service, user).await?;
    Ok(session_response(session))
}

/// Issues a fresh verification code for an unverified account.
pub async fn resend_verification(
    pool: web::Data<PgPool>,
    notification_service: web::Data<NotificationService>,
    verification_store: web::Data<VerificationStore>,
    request: web::Json<EmailRequest>,
) -> Result<HttpResponse, AuthError> {
    request.validate()?;

    let auth_service = AuthService::new(pool.get_ref().clone());
    let user = auth_service
        .get_user_by_email(&request.email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if user.email_verified {
        return Err(AuthError::AlreadyVerified);
    }

    let code = NotificationService::generate_verification_code();
    store_verification_code(
        &verification_store,
        &email_verification_key(&user.email),
        &code,
        ACCOUNT_CODE_TTL_MINUTES,
    );

    let email_sent = notification_service
        .send_account_verification_code(&user.email, &user.name, &code)
        .await
        .inspect_err(|e| warn!("Failed to resend verification email: {}", e))
        .is_ok();

    Ok(HttpResponse::Ok().json(CodeSentResponse {
        message: "A new verification code was sent".to_string(),
        email_sent,
    }))
}

/// Handles user login by verifying credentials and issuing a session.
pub async fn login(
    pool: web::Data<PgPool>,
    jwt_service: web::Data<JwtService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AuthError> {
    request.validate()?;

    let auth_service = AuthService::new(pool.get_ref().clone());
    let user = auth_service
        .verify_password(&request.email, &request.password)
        .await?;

    let session = auth_service.issue_session(&jwt_service, user).await?;
    Ok(session_response(session))
}

/// Login for the admin console. Only admin accounts are accepted.
pub async fn admin_login(
    pool: web::Data<PgPool>,
    jwt_service: web::Data<JwtService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AuthError> {
    request.validate()?;

    let auth_service = AuthService::new(pool.get_ref().clone());
    let user = auth_service
        .verify_password(&request.email, &request.password)
        .await?;

    if user.role != Role::Admin {
        return Err(AuthError::Forbidden("Admin access required".to_string()));
    }

    let session = auth_service.issue_session(&jwt_service, user).await?;
    Ok(session_response(session))
}

/// Exchanges a refresh token for a new token pair.
pub async fn refresh_token(
    pool: web::Data<PgPool>,
    jwt_service: web::Data<JwtService>,
    request: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, AuthError> {
    let auth_service = AuthService::new(pool.get_ref().clone());
    let session = auth_service
        .refresh_session(&jwt_service, &request.refresh_token)
        .await?;
    Ok(session_response(session))
}

/// Revokes the given session, or every session of the caller when the
/// body names none, and clears the access-token cookie.
pub async fn logout(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    request: Option<web::Json<LogoutRequest>>,
) -> Result<HttpResponse, AuthError> {
    let auth_service = AuthService::new(pool.get_ref().clone());

    match request.and_then(|r| r.into_inner().refresh_token) {
        Some(token) => auth_service.delete_session(&user.id, &token).await?,
        None => {
            auth_service.delete_user_sessions(&user.id).await?;
        }
    }

    let mut cookie = Cookie::new(ACCESS_TOKEN_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(MessageResponse::new("Logged out successfully")))
}

/// Emails a password reset code. Always answers the same way so account
/// existence is not revealed.
pub async fn forgot_password(
    pool: web::Data<PgPool>,
    notification_service: web::Data<NotificationService>,
    verification_store: web::Data<VerificationStore>,
    request: web::Json<EmailRequest>,
) -> Result<HttpResponse, AuthError> {
    request.validate()?;

    let auth_service = AuthService::new(pool.get_ref().clone());
    if let Some(user) = auth_service.get_user_by_email(&request.email).await? {
        if user.is_active {
            let code = NotificationService::generate_verification_code();
            store_verification_code(
                &verification_store,
                &password_reset_key(&user.email),
                &code,
                ACCOUNT_CODE_TTL_MINUTES,
            );

            if let Err(e) = notification_service
                .send_password_reset_code(&user.email, &code)
                .await
            {
                warn!("Failed to send password reset email: {}", e);
            }
        }
    }

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "If an account exists for this email, a reset code has been sent",
    )))
}

/// Checks a reset code without consuming it.
pub async fn verify_reset_code(
    verification_store: web::Data<VerificationStore>,
    request: web::Json<VerifyEmailRequest>,
) -> Result<HttpResponse, AuthError> {
    request.validate()?;

    if !check_code(
        &verification_store,
        &password_reset_key(&request.email),
        &request.code,
    )? {
        return Err(AuthError::InvalidCode);
    }

    Ok(HttpResponse::Ok().json(MessageResponse::new("Reset code is valid")))
}

/// Consumes a reset code, stores the new password and revokes every
/// session of the account.
pub async fn reset_password(
    pool: web::Data<PgPool>,
    notification_service: web::Data<NotificationService>,
    verification_store: web::Data<VerificationStore>,
    request: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, AuthError> {
    request.validate()?;

    if !verify_code(
        &verification_store,
        &password_reset_key(&request.email),
        &request.code,
    )? {
        return Err(AuthError::InvalidCode);
    }

    let auth_service = AuthService::new(pool.get_ref().clone());
    let user = auth_service
        .get_user_by_email(&request.email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    auth_service
        .update_password(&user.id, &request.new_password)
        .await?;
    let revoked = auth_service.delete_user_sessions(&user.id).await?;
    log::info!(
        "🔑 Password reset for {}, {} sessions revoked",
        user.email,
        revoked
    );

    if let Err(e) = notification_service
        .send_password_reset_success(&user.email)
        .await
    {
        warn!("Failed to send password reset confirmation: {}", e);
    }

    Ok(HttpResponse::Ok().json(MessageResponse::new("Password reset successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_cookie_attributes() {
        let cookie = access_cookie("token-value");
        assert_eq!(cookie.name(), ACCESS_TOKEN_COOKIE);
        assert_eq!(cookie.value(), "token-value");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.max_age(),
            Some(CookieDuration::hours(ACCESS_TOKEN_TTL_HOURS))
        );
    }
}
