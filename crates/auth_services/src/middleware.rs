use actix_web::{
    Error, HttpMessage, HttpResponse, Result,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::HeaderMap,
    web,
};
use futures_util::future::LocalBoxFuture;
use sqlx::PgPool;
use std::{
    future::{Ready, ready},
    rc::Rc,
};
use uuid::Uuid;

use crate::jwt::JwtService;
use crate::service::AuthService;
use crate::types::Role;

/// Cookie consulted when no `Authorization` header is present.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Middleware that authenticates requests by JWT, loads the user and
/// optionally enforces a role.
///
/// Needs `web::Data<PgPool>` in the app; `web::Data<JwtService>` is used
/// when present, otherwise a [`JwtService`] is built from the environment.
#[derive(Clone, Default)]
pub struct AuthMiddleware {
    required_role: Option<Role>,
}

impl AuthMiddleware {
    /// Any signed-in, active user.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signed-in, active user with exactly this role.
    pub fn require(role: Role) -> Self {
        Self {
            required_role: Some(role),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            required_role: self.required_role,
        }))
    }
}

/// Service that implements the authentication middleware logic
pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    required_role: Option<Role>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let required_role = self.required_role;

        Box::pin(async move {
            let token = request_token(req.headers(), req.cookie(ACCESS_TOKEN_COOKIE).as_ref());

            let token = match token {
                Some(token) => token,
                None => {
                    let response = HttpResponse::Unauthorized().json(serde_json::json!({
                        "error": "missing_token",
                        "message": "Authorization token is required"
                    }));
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            let jwt_service = req
                .app_data::<web::Data<JwtService>>()
                .map(|data| data.get_ref().clone())
                .unwrap_or_else(JwtService::new);

            let user_id = match jwt_service.extract_user_id_from_token(&token) {
                Ok(user_id) => user_id,
                Err(_) => {
                    let response = HttpResponse::Unauthorized().json(serde_json::json!({
                        "error": "invalid_token",
                        "message": "Invalid or expired token"
                    }));
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            let pool = match req.app_data::<web::Data<PgPool>>() {
                Some(pool) => pool.get_ref().clone(),
                None => {
                    log::error!("❌ AuthMiddleware mounted without a database pool");
                    let response = HttpResponse::InternalServerError().json(serde_json::json!({
                        "error": "internal_error",
                        "message": "An internal error occurred"
                    }));
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            let user = match AuthService::new(pool).get_user_by_id(&user_id).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    let response = HttpResponse::Unauthorized().json(serde_json::json!({
                        "error": "user_not_found",
                        "message": "The account for this token no longer exists"
                    }));
                    return Ok(req.into_response(response).map_into_right_body());
                }
                Err(e) => {
                    log::error!("❌ Failed to load user {}: {}", user_id, e);
                    let response = HttpResponse::InternalServerError().json(serde_json::json!({
                        "error": "internal_error",
                        "message": "An internal error occurred"
                    }));
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            if !user.is_active {
                let response = HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "account_suspended",
                    "message": "This account has been suspended"
                }));
                return Ok(req.into_response(response).map_into_right_body());
            }

            if let Some(role) = required_role {
                if user.role != role {
                    let response = HttpResponse::Forbidden().json(serde_json::json!({
                        "error": "forbidden",
                        "message": format!("This action requires the {} role", role)
                    }));
                    return Ok(req.into_response(response).map_into_right_body());
                }
            }

            req.extensions_mut().insert(AuthenticatedUser {
                id: user.id,
                role: user.role,
            });

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Pulls a bearer token from the `Authorization` header, falling back to
/// the access-token cookie.
pub fn request_token(
    headers: &HeaderMap,
    cookie: Option<&actix_web::cookie::Cookie<'_>>,
) -> Option<String> {
    bearer_token(headers).or_else(|| {
        cookie
            .map(|c| c.value().trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Token from an `Authorization: Bearer …` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Custom extractor for the authenticated user
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    /// User id
    pub id: Uuid,
    /// Role at the time of the request
    pub role: Role,
}

impl AuthenticatedUser {
    /// Whether the caller is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl actix_web::FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let user = req.extensions().get::<AuthenticatedUser>().copied();

        ready(match user {
            Some(user) => Ok(user),
            None => Err(actix_web::error::ErrorUnauthorized(
                "User not authenticated",
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use sqlx::postgres::PgPoolOptions;

    use crate::types::User;

    async fn protected(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().body(user.id.to_string())
    }

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/rv_marketplace_test")
            .unwrap()
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Traveler,
            email_verified: true,
            is_active: true,
            phone: None,
            image: None,
            bio: None,
            stripe_account_id: None,
            is_online: false,
            last_seen: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[actix_web::test]
    async fn test_missing_token_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(JwtService::with_secret("secret")))
                .service(
                    web::scope("/p")
                        .wrap(AuthMiddleware::new())
                        .route("", web::get().to(protected)),
                ),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/p").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "missing_token");
    }

    #[actix_web::test]
    async fn test_refresh_token_is_not_accepted_as_bearer() {
        let jwt = JwtService::with_secret("secret");
        let refresh = jwt.generate_refresh_token(&user()).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(jwt))
                .service(
                    web::scope("/p")
                        .wrap(AuthMiddleware::require(Role::Admin))
                        .route("", web::get().to(protected)),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/p")
            .insert_header(("Authorization", format!("Bearer {}", refresh)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_token");
    }

    #[actix_web::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let foreign = JwtService::with_secret("other")
            .generate_access_token(&user())
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(JwtService::with_secret("secret")))
                .service(
                    web::scope("/p")
                        .wrap(AuthMiddleware::new())
                        .route("", web::get().to(protected)),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/p")
            .cookie(actix_web::cookie::Cookie::new(ACCESS_TOKEN_COOKIE, foreign))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            actix_web::http::header::AUTHORIZATION,
            "Bearer abc.def".parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(
            actix_web::http::header::AUTHORIZATION,
            "Basic Zm9vOmJhcg==".parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers), None);
    }

    #[actix_web::test]
    async fn test_cookie_fallback() {
        let headers = HeaderMap::new();
        let cookie = actix_web::cookie::Cookie::new(ACCESS_TOKEN_COOKIE, "tok");
        assert_eq!(request_token(&headers, Some(&cookie)).as_deref(), Some("tok"));
    }
}
