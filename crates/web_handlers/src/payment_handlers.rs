use actix_web::{HttpRequest, HttpResponse, Result, web};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use auth_services::middleware::AuthenticatedUser;
use payments::{ConnectAccountRequest, PaymentConfig, PaymentError, PaymentGateway, PaymentService};

/// Header carrying the webhook signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Query string of the success redirect.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    /// Checkout session id substituted by the provider
    #[serde(alias = "sessionId")]
    pub session_id: String,
}

fn payment_service(
    pool: &web::Data<PgPool>,
    config: &web::Data<PaymentConfig>,
    gateway: &web::Data<dyn PaymentGateway>,
) -> PaymentService {
    PaymentService::new(
        pool.get_ref().clone(),
        config.get_ref().clone(),
        gateway.clone().into_inner(),
    )
}

/// Records the landowner's connected payout account.
pub async fn set_connect_account(
    pool: web::Data<PgPool>,
    config: web::Data<PaymentConfig>,
    gateway: web::Data<dyn PaymentGateway>,
    user: AuthenticatedUser,
    request: web::Json<ConnectAccountRequest>,
) -> Result<HttpResponse, PaymentError> {
    payment_service(&pool, &config, &gateway)
        .set_connect_account(&user.id, user.role, &request.account_id)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Payout account connected",
        "account_id": request.account_id.trim()
    })))
}

/// Opens a hosted checkout for one of the traveler's bookings.
pub async fn create_checkout_session(
    pool: web::Data<PgPool>,
    config: web::Data<PaymentConfig>,
    gateway: web::Data<dyn PaymentGateway>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PaymentError> {
    let checkout = payment_service(&pool, &config, &gateway)
        .create_checkout_session(&user.id, &path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(checkout))
}

/// Redirect target after a successful checkout. Unauthenticated.
pub async fn payment_success(
    pool: web::Data<PgPool>,
    config: web::Data<PaymentConfig>,
    gateway: web::Data<dyn PaymentGateway>,
    query: web::Query<SuccessQuery>,
) -> Result<HttpResponse, PaymentError> {
    let settled = payment_service(&pool, &config, &gateway)
        .payment_success(&query.session_id)
        .await?;

    Ok(HttpResponse::Ok().json(settled))
}

/// Provider webhook. Reads the raw body so the signature can be checked.
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    pool: web::Data<PgPool>,
    config: web::Data<PaymentConfig>,
    gateway: web::Data<dyn PaymentGateway>,
) -> Result<HttpResponse, PaymentError> {
    let signature = req
        .headers()
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    payment_service(&pool, &config, &gateway)
        .handle_webhook(&body, signature)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true })))
}

/// Provider-side state of one of the caller's checkout sessions.
pub async fn session_status(
    pool: web::Data<PgPool>,
    config: web::Data<PaymentConfig>,
    gateway: web::Data<dyn PaymentGateway>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, PaymentError> {
    let status = payment_service(&pool, &config, &gateway)
        .session_status(&user.id, &path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(status))
}

/// Ledger entries the caller paid or received.
pub async fn my_transactions(
    pool: web::Data<PgPool>,
    config: web::Data<PaymentConfig>,
    gateway: web::Data<dyn PaymentGateway>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, PaymentError> {
    let transactions = payment_service(&pool, &config, &gateway)
        .my_transactions(&user.id)
        .await?;

    Ok(HttpResponse::Ok().json(transactions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpMessage, dev::Service, http::StatusCode, test};
    use async_trait::async_trait;
    use auth_services::types::Role;
    use payments::{CheckoutRequest, CheckoutSession, ConnectedAccount};
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    struct UnreachableGateway;

    #[async_trait]
    impl PaymentGateway for UnreachableGateway {
        async fn retrieve_account(&self, _: &str) -> Result<ConnectedAccount, PaymentError> {
            Err(PaymentError::Gateway("offline".to_string()))
        }

        async fn create_checkout_session(
            &self,
            _: &CheckoutRequest,
        ) -> Result<CheckoutSession, PaymentError> {
            Err(PaymentError::Gateway("offline".to_string()))
        }

        async fn retrieve_session(&self, _: &str) -> Result<CheckoutSession, PaymentError> {
            Err(PaymentError::SessionNotFound)
        }
    }

    fn config(webhook_secret: Option<&str>) -> PaymentConfig {
        PaymentConfig::new(
            "sk_test_123",
            webhook_secret.map(str::to_string),
            3.0,
            "http://localhost:8080",
            "http://localhost:3000",
        )
    }

    fn gateway() -> web::Data<dyn PaymentGateway> {
        web::Data::from(Arc::new(UnreachableGateway) as Arc<dyn PaymentGateway>)
    }

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/rv_marketplace_test")
            .unwrap()
    }

    #[actix_web::test]
    async fn test_webhook_without_signature_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(config(Some("whsec_test"))))
                .app_data(gateway())
                .route("/webhook", web::post().to(stripe_webhook)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook")
            .set_payload(r#"{"type":"checkout.session.completed"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_signature");
    }

    #[actix_web::test]
    async fn test_ignored_event_is_acknowledged() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(config(None)))
                .app_data(gateway())
                .route("/webhook", web::post().to(stripe_webhook)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/webhook")
            .set_payload(r#"{"id":"evt_1","type":"customer.created","data":{"object":{}}}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_success_for_unknown_session_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(config(None)))
                .app_data(gateway())
                .route("/success", web::get().to(payment_success)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/success?session_id=cs_missing")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_success_with_malformed_session_id_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(config(None)))
                .app_data(gateway())
                .route("/success", web::get().to(payment_success)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/success?session_id=..%2F..%2Faccounts%2Facct_1")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_session_id");
    }

    #[actix_web::test]
    async fn test_session_status_requires_authentication() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(config(None)))
                .app_data(gateway())
                .route("/session/{session_id}", web::get().to(session_status)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/session/cs_test_1")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_session_status_rejects_malformed_id_before_lookup() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(config(None)))
                .app_data(gateway())
                .wrap_fn(|req, srv| {
                    req.extensions_mut().insert(AuthenticatedUser {
                        id: Uuid::new_v4(),
                        role: Role::Traveler,
                    });
                    srv.call(req)
                })
                .route("/session/{session_id}", web::get().to(session_status)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/session/acct_123")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_session_id");
    }
}
