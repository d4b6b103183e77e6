use actix_web::{HttpResponse, Result, dev::HttpServiceFactory, web};

use auth_services::middleware::AuthMiddleware;
use auth_services::types::Role;

use crate::{
    admin_handlers as admin, auth_handlers as auth, booking_handlers as booking, chat_socket,
    content_handlers as content, landowner_handlers as landowner, listing_handlers as listing,
    message_handlers as message, payment_handlers as payment, profile_handlers as profile,
};

/// Liveness check.
pub async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "service": "rv-marketplace",
        "status": "healthy",
        "timestamp": chrono::Utc::now()
    })))
}

/// Mounts every API route and the chat socket.
///
/// Expects `PgPool`, `JwtService`, `NotificationService`,
/// `VerificationStore`, `PaymentConfig`, `dyn PaymentGateway` and `ChatHub`
/// as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws/chat", web::get().to(chat_socket::chat_socket))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(health))
                .service(auth_scope())
                .service(global_scope())
                .service(
                    web::scope("/contact")
                        .wrap(AuthMiddleware::new())
                        .route("", web::post().to(content::submit_contact_form)),
                )
                .service(dashboard_scope())
                .service(traveler_scope())
                .service(landowner_scope())
                .service(booking_scope())
                .service(payment_scope())
                .service(message_scope())
                .service(admin_scope()),
        );
}

fn auth_scope() -> impl HttpServiceFactory {
    web::scope("/auth")
        .route("/signup", web::post().to(auth::signup))
        .route("/verify-email", web::post().to(auth::verify_email))
        .route("/resend-verification", web::post().to(auth::resend_verification))
        .route("/login", web::post().to(auth::login))
        .route("/refresh-token", web::post().to(auth::refresh_token))
        .route("/forgot-password", web::post().to(auth::forgot_password))
        .route("/verify-reset-code", web::post().to(auth::verify_reset_code))
        .route("/reset-password", web::post().to(auth::reset_password))
        .service(
            web::scope("")
                .wrap(AuthMiddleware::new())
                .route("/logout", web::post().to(auth::logout)),
        )
}

fn global_scope() -> impl HttpServiceFactory {
    web::scope("/global")
        .route("/search", web::get().to(listing::search_listings))
        .route("/filter", web::get().to(listing::filter_listings))
        .route("/available-lands", web::get().to(listing::available_listings))
        .route("/all-lands", web::get().to(listing::all_listings))
        .route("/featured-lands", web::get().to(listing::featured_listings))
        .route("/lands/{id}", web::get().to(listing::get_listing))
        .route("/lands/{id}/booked-dates", web::get().to(booking::booked_dates))
        .route("/rating/{id}", web::get().to(listing::listing_reviews))
        .route("/content/{slug}", web::get().to(content::get_content))
}

fn dashboard_scope() -> impl HttpServiceFactory {
    web::scope("/dashboard")
        .wrap(AuthMiddleware::new())
        .route("/profile", web::get().to(profile::get_profile))
        .route("/update-profile", web::patch().to(profile::update_profile))
        .route("/change-password", web::put().to(profile::change_password))
        .route("/my-bookings", web::get().to(booking::my_bookings))
}

fn traveler_scope() -> impl HttpServiceFactory {
    web::scope("/traveler")
        .wrap(AuthMiddleware::new())
        .route("/rating/{id}", web::post().to(listing::add_review))
        .route("/rating/{id}", web::delete().to(listing::remove_review))
        .route("/saved", web::get().to(listing::saved_listings))
        .route("/saved/{id}", web::post().to(listing::save_listing))
        .route("/saved/{id}", web::delete().to(listing::unsave_listing))
}

fn landowner_scope() -> impl HttpServiceFactory {
    web::scope("/landowner")
        .wrap(AuthMiddleware::require(Role::Landowner))
        .route("/lands", web::get().to(listing::my_listings))
        .route("/addland", web::post().to(listing::create_listing))
        .route("/updateland/{id}", web::post().to(listing::update_listing))
        .route("/updateland/{id}", web::patch().to(listing::update_listing))
        .route("/deleteland/{id}", web::delete().to(listing::delete_listing))
        .route("/overview", web::get().to(landowner::overview))
        .route("/earnings", web::get().to(landowner::earnings))
        .route("/transactions", web::get().to(landowner::transactions))
        .route("/all-reviews", web::get().to(landowner::all_reviews))
}

fn booking_scope() -> impl HttpServiceFactory {
    web::scope("/booking")
        .wrap(AuthMiddleware::new())
        .route("/mine", web::get().to(booking::my_bookings))
        .route("/details/{id}", web::get().to(booking::get_booking))
        .route("/{id}/verify", web::post().to(booking::verify_booking))
        .route("/{id}/resend-code", web::post().to(booking::resend_booking_code))
        .route("/{id}/cancel", web::post().to(booking::cancel_booking))
        .route("/{id}", web::post().to(booking::create_booking))
}

fn payment_scope() -> impl HttpServiceFactory {
    web::scope("/payments")
        .route("/success", web::get().to(payment::payment_success))
        .route("/webhook", web::post().to(payment::stripe_webhook))
        .service(
            web::scope("")
                .wrap(AuthMiddleware::new())
                .route("/checkout/{booking_id}", web::post().to(payment::create_checkout_session))
                .route("/session/{session_id}", web::get().to(payment::session_status))
                .route("/transactions/mine", web::get().to(payment::my_transactions))
                .route("/connect/set", web::post().to(payment::set_connect_account)),
        )
}

fn message_scope() -> impl HttpServiceFactory {
    web::scope("/message")
        .wrap(AuthMiddleware::new())
        .route("/users", web::get().to(message::conversation_partners))
        .route("/users/search/{query}", web::get().to(message::search_chat_users))
        .route("/send/{id}", web::post().to(message::send_message))
        .route("/{id}", web::get().to(message::get_conversation))
}

fn admin_scope() -> impl HttpServiceFactory {
    web::scope("/admin")
        .route("/login", web::post().to(auth::admin_login))
        .route("/forgot-password", web::post().to(auth::forgot_password))
        .route("/resend-password-reset-code", web::post().to(auth::forgot_password))
        .route("/verify-reset-code", web::post().to(auth::verify_reset_code))
        .route("/reset-password", web::post().to(auth::reset_password))
        .route("/content/{slug}", web::get().to(content::get_content))
        .service(
            web::scope("")
                .wrap(AuthMiddleware::require(Role::Admin))
                .route("/logout", web::post().to(auth::logout))
                .route("/dashboard-stats", web::get().to(admin::dashboard_stats))
                .route("/booking-stats", web::get().to(admin::booking_stats))
                .route("/earning-stats", web::get().to(admin::earning_stats))
                .route("/recent-activities", web::get().to(admin::recent_activities))
                .route("/users", web::get().to(admin::list_users))
                .route("/users/search", web::get().to(admin::search_users))
                .route("/users/suspend/{id}", web::patch().to(admin::suspend_user))
                .route("/users/activate/{id}", web::patch().to(admin::activate_user))
                .route("/users/{id}", web::get().to(admin::get_user))
                .route("/users/{id}", web::delete().to(admin::delete_user))
                .route("/spots", web::get().to(admin::all_spots))
                .route("/all-bookings", web::get().to(admin::all_bookings))
                .route("/transactions", web::get().to(admin::all_transactions))
                .route("/content", web::get().to(admin::all_content))
                .route("/content/{slug}", web::put().to(admin::update_content))
                .route("/profile", web::get().to(profile::get_profile))
                .route("/update-profile", web::patch().to(profile::update_profile))
                .route("/change-password", web::put().to(profile::change_password)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use auth_services::jwt::JwtService;
    use auth_services::types::User;
    use notification_services::{MemoryTransport, NotificationService, create_verification_store};
    use std::sync::Arc;
    use sqlx::postgres::PgPoolOptions;

    macro_rules! app {
        () => {{
            let pool = PgPoolOptions::new()
                .acquire_timeout(std::time::Duration::from_secs(2))
                .connect_lazy("postgres://localhost/rv_marketplace_test")
                .unwrap();
            test::init_service(
                App::new()
                    .app_data(web::Data::new(pool))
                    .app_data(web::Data::new(JwtService::with_secret("secret")))
                    .app_data(web::Data::new(NotificationService::with_transport(
                        Arc::new(MemoryTransport::new()),
                        "noreply@example.com",
                        "RV Spots",
                        "contact@example.com",
                    )))
                    .app_data(web::Data::new(create_verification_store()))
                    .configure(configure),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn test_health() {
        let app = app!();
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request())
                .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_protected_scopes_require_a_token() {
        let app = app!();
        for (method, uri) in [
            ("GET", "/api/dashboard/profile"),
            ("GET", "/api/landowner/overview"),
            ("GET", "/api/booking/mine"),
            ("GET", "/api/message/users"),
            ("GET", "/api/payments/transactions/mine"),
            ("GET", "/api/admin/dashboard-stats"),
            ("POST", "/api/contact"),
        ] {
            let req = match method {
                "POST" => test::TestRequest::post(),
                _ => test::TestRequest::get(),
            }
            .uri(uri)
            .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }

    #[actix_web::test]
    async fn test_unknown_public_content_is_not_found() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/global/content/careers")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    fn user() -> User {
        User {
            id: uuid::Uuid::new_v4(),
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
    async fn test_logout_is_authenticated_by_middleware() {
        let app = app!();
        let token = JwtService::with_secret("secret")
            .generate_access_token(&user())
            .unwrap();

        for uri in ["/api/auth/logout", "/api/admin/logout"] {
            let req = test::TestRequest::post().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "missing_token", "{}", uri);

            // A valid token gets past verification to the account lookup.
            let req = test::TestRequest::post()
                .uri(uri)
                .insert_header(("Authorization", format!("Bearer {}", token)))
                .to_request();
            let resp = test::call_service(&app, req).await;
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_ne!(body["error"], "missing_token", "{}", uri);
            assert_ne!(body["error"], "invalid_token", "{}", uri);
        }
    }

    #[actix_web::test]
    async fn test_admin_resend_reset_code_is_public() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/admin/resend-password-reset-code")
            .set_json(serde_json::json!({ "email": "not-an-email" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
