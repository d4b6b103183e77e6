use actix_web::{HttpResponse, Result, web};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use admin_services::{
    AdminError, AdminService, ContentKind, ContentRequest, ContentService, UserListQuery,
    UserSearchQuery,
};

/// Totals shown on the admin dashboard.
pub async fn dashboard_stats(pool: web::Data<PgPool>) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.dashboard_stats().await?))
}

/// Booking counts by status and month.
pub async fn booking_stats(pool: web::Data<PgPool>) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.booking_stats().await?))
}

/// Payment volume and platform earnings.
pub async fn earning_stats(pool: web::Data<PgPool>) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.earning_stats().await?))
}

/// Latest signups, bookings and listings.
pub async fn recent_activities(pool: web::Data<PgPool>) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.recent_activities().await?))
}

/// Paginated user list, optionally filtered by role.
pub async fn list_users(
    pool: web::Data<PgPool>,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.list_users(&query).await?))
}

/// Users whose name or email contains the query.
pub async fn search_users(
    pool: web::Data<PgPool>,
    query: web::Query<UserSearchQuery>,
) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.search_users(&query.q).await?))
}

/// One user.
pub async fn get_user(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.get_user(&path.into_inner()).await?))
}

/// Deactivates a user and signs them out everywhere.
pub async fn suspend_user(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    let user = service.suspend_user(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "User suspended",
        "user": user
    })))
}

/// Reactivates a suspended user.
pub async fn activate_user(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    let user = service.activate_user(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "User activated",
        "user": user
    })))
}

/// Deletes a user.
pub async fn delete_user(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AdminError> {
    let user_id = path.into_inner();
    let service = AdminService::new(pool.get_ref().clone());
    service.delete_user(&user_id).await?;

    log::warn!("🚨 User {} deleted by an administrator", user_id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "User deleted",
        "id": user_id
    })))
}

/// Every listing.
pub async fn all_spots(pool: web::Data<PgPool>) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.all_listings().await?))
}

/// Every booking with traveler and listing names.
pub async fn all_bookings(pool: web::Data<PgPool>) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.all_bookings().await?))
}

/// The full transaction ledger.
pub async fn all_transactions(pool: web::Data<PgPool>) -> Result<HttpResponse, AdminError> {
    let service = AdminService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.all_transactions().await?))
}

/// Every editable page.
pub async fn all_content(pool: web::Data<PgPool>) -> Result<HttpResponse, AdminError> {
    let service = ContentService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.all().await?))
}

/// Replaces the text of a page, addressed by slug.
pub async fn update_content(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
    request: web::Json<ContentRequest>,
) -> Result<HttpResponse, AdminError> {
    let kind = ContentKind::from_slug(&path.into_inner())?;
    request.validate()?;

    let service = ContentService::new(pool.get_ref().clone());
    let content = service.put(kind, request.text.trim()).await?;

    log::info!("📝 Website content {} updated", kind.as_str());
    Ok(HttpResponse::Ok().json(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use sqlx::postgres::PgPoolOptions;

    #[actix_web::test]
    async fn test_unknown_content_slug_is_not_found() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/rv_marketplace_test")
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .route("/content/{slug}", web::put().to(update_content)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/content/careers")
            .set_json(serde_json::json!({ "text": "We are hiring" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
