//! Main entry point for the RV marketplace backend server.
//! Serves the REST API, the chat socket and optionally the built frontend.

mod expiry_manager;

use std::path::Path;
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;

use auth_services::jwt::JwtService;
use auth_services::service::AuthService;
use bookings::SweeperConfig;
use messaging::ChatHub;
use notification_services::{NotificationService, create_verification_store};
use payments::{PaymentConfig, PaymentGateway, StripeClient};
use postgres::database::*;

use crate::expiry_manager::ExpiryManager;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

fn get_frontend_path() -> Option<String> {
    if let Ok(dir) = std::env::var("FRONTEND_DIR") {
        if Path::new(&dir).exists() {
            log::info!("✅ Using frontend path from FRONTEND_DIR: {}", dir);
            return Some(dir);
        }
        log::warn!("⚠️ FRONTEND_DIR {} does not exist", dir);
    }

    ["./frontend-build", "../frontend/build"]
        .into_iter()
        .find(|p| Path::new(p).exists())
        .map(|p| {
            log::info!("✅ Using frontend path: {}", p);
            p.to_string()
        })
}

async fn bootstrap_admin(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (
        std::env::var("ADMIN_EMAIL"),
        std::env::var("ADMIN_PASSWORD"),
    ) else {
        log::info!("ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping admin bootstrap");
        return Ok(());
    };
    let name = std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string());

    let admin = AuthService::new(pool.clone())
        .ensure_admin(&name, &email, &password)
        .await
        .context("failed to bootstrap the admin account")?;
    log::info!("🛡️ Admin account ready: {}", admin.email);
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("🚀 Starting RV marketplace server...");

    let pool = create_connection_pool()
        .await
        .context("failed to create the database pool")?;
    test_connection(&pool)
        .await
        .context("database connection test failed")?;
    run_migrations(&pool)
        .await
        .context("failed to apply migrations")?;

    bootstrap_admin(&pool).await?;

    let notification_service = NotificationService::new()
        .await
        .context("failed to initialize the notification service")?;
    log::info!("📧 Notification service initialized successfully");

    let verification_store = create_verification_store();
    let jwt_service = JwtService::new();

    let payment_config = PaymentConfig::from_env();
    let stripe_client = StripeClient::new(payment_config.secret_key.clone())
        .context("failed to create the payment client")?;
    let gateway: web::Data<dyn PaymentGateway> =
        web::Data::from(Arc::new(stripe_client) as Arc<dyn PaymentGateway>);

    let chat_hub = ChatHub::new();

    let mut expiry_manager = ExpiryManager::new(
        pool.clone(),
        verification_store.clone(),
        SweeperConfig::from_env(),
    );
    expiry_manager.start();

    let frontend_url = payment_config.frontend_url.clone();
    let frontend_path = get_frontend_path();
    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    log::info!("🌐 Server will be available at: http://{}", bind_address);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        let app = App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(notification_service.clone()))
            .app_data(web::Data::new(verification_store.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::new(payment_config.clone()))
            .app_data(gateway.clone())
            .app_data(web::Data::new(chat_hub.clone()))
            .app_data(web::JsonConfig::default().limit(10 * 1024 * 1024))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(web_handlers::configure);

        match &frontend_path {
            Some(path) => app.service(Files::new("/", path).index_file("index.html")),
            None => app,
        }
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .run();

    let result = server.await;
    expiry_manager.stop().await;
    result.context("server stopped with an error")
}
