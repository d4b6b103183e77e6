use actix_web::{HttpResponse, Result, web};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use auth_services::middleware::AuthenticatedUser;
use bookings::{BookingError, BookingService, CreateBookingRequest, VerifyBookingRequest};
use notification_services::NotificationService;

fn booking_service(pool: &web::Data<PgPool>, notifications: &web::Data<NotificationService>) -> BookingService {
    BookingService::new(pool.get_ref().clone(), notifications.get_ref().clone())
}

/// Creates a pending booking of a listing and emails its code.
pub async fn create_booking(
    pool: web::Data<PgPool>,
    notifications: web::Data<NotificationService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    request: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, BookingError> {
    request.validate()?;

    let issued = booking_service(&pool, &notifications)
        .create_booking(&user.id, &path.into_inner(), &request)
        .await?;

    Ok(HttpResponse::Created().json(issued))
}

/// Confirms a pending booking with its emailed code.
pub async fn verify_booking(
    pool: web::Data<PgPool>,
    notifications: web::Data<NotificationService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    request: web::Json<VerifyBookingRequest>,
) -> Result<HttpResponse, BookingError> {
    request.validate()?;

    let booking = booking_service(&pool, &notifications)
        .verify_booking(&user.id, &path.into_inner(), &request.code)
        .await?;

    Ok(HttpResponse::Ok().json(booking))
}

/// Sends a new code for a pending booking.
pub async fn resend_booking_code(
    pool: web::Data<PgPool>,
    notifications: web::Data<NotificationService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, BookingError> {
    let issued = booking_service(&pool, &notifications)
        .resend_booking_code(&user.id, &path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(issued))
}

/// Cancels an unpaid booking of the caller.
pub async fn cancel_booking(
    pool: web::Data<PgPool>,
    notifications: web::Data<NotificationService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, BookingError> {
    let booking = booking_service(&pool, &notifications)
        .cancel_booking(&user.id, &path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(booking))
}

/// The caller's bookings, newest first.
pub async fn my_bookings(
    pool: web::Data<PgPool>,
    notifications: web::Data<NotificationService>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, BookingError> {
    let bookings = booking_service(&pool, &notifications)
        .my_bookings(&user.id)
        .await?;
    Ok(HttpResponse::Ok().json(bookings))
}

/// One booking, visible to its traveler, the listing owner and admins.
pub async fn get_booking(
    pool: web::Data<PgPool>,
    notifications: web::Data<NotificationService>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, BookingError> {
    let booking = booking_service(&pool, &notifications)
        .get_booking(&user.id, &path.into_inner(), user.is_admin())
        .await?;
    Ok(HttpResponse::Ok().json(booking))
}

/// Date ranges of a listing that cannot be booked.
pub async fn booked_dates(
    pool: web::Data<PgPool>,
    notifications: web::Data<NotificationService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, BookingError> {
    let ranges = booking_service(&pool, &notifications)
        .booked_dates(&path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ranges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpMessage, dev::Service, http::StatusCode, test};
    use auth_services::types::Role;
    use notification_services::MemoryTransport;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_short_code_is_rejected_before_lookup() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/rv_marketplace_test")
            .unwrap();
        let notifications = NotificationService::with_transport(
            Arc::new(MemoryTransport::new()),
            "noreply@example.com",
            "RV Spots",
            "contact@example.com",
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(notifications))
                .wrap_fn(|req, srv| {
                    req.extensions_mut().insert(AuthenticatedUser {
                        id: Uuid::new_v4(),
                        role: Role::Traveler,
                    });
                    srv.call(req)
                })
                .route("/{id}/verify", web::post().to(verify_booking)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/{}/verify", Uuid::new_v4()))
            .set_json(serde_json::json!({ "code": "123" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "validation_error");
    }
}
