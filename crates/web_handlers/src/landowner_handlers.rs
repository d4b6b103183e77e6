use actix_web::{HttpResponse, Result, web};
use sqlx::PgPool;

use admin_services::{AdminError, LandownerDashboard};
use auth_services::middleware::AuthenticatedUser;
use listings::{ListingError, ReviewService};

/// Listing count, completed stays and earnings of the landowner.
pub async fn overview(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AdminError> {
    let dashboard = LandownerDashboard::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(dashboard.overview(&user.id).await?))
}

/// Owner share totals and per month.
pub async fn earnings(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AdminError> {
    let dashboard = LandownerDashboard::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(dashboard.earnings(&user.id).await?))
}

/// Payments received by the landowner.
pub async fn transactions(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AdminError> {
    let dashboard = LandownerDashboard::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(dashboard.transactions(&user.id).await?))
}

/// Reviews across every listing the landowner owns.
pub async fn all_reviews(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ListingError> {
    let service = ReviewService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.reviews_for_owner(&user.id).await?))
}
