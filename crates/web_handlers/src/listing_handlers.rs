use actix_web::{HttpResponse, Result, web};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use auth_services::middleware::AuthenticatedUser;
use listings::{
    CreateListingRequest, FilterQuery, ListingError, ListingFilter, ListingService,
    ReviewRequest, ReviewService, SavedListingService, SearchQuery, UpdateListingRequest,
};

/// Creates a listing owned by the signed-in landowner.
pub async fn create_listing(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    request: web::Json<CreateListingRequest>,
) -> Result<HttpResponse, ListingError> {
    request.validate()?;

    let service = ListingService::new(pool.get_ref().clone());
    let listing = service.create_listing(&user.id, &request).await?;

    Ok(HttpResponse::Created().json(listing))
}

/// The landowner's own listings.
pub async fn my_listings(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ListingError> {
    let service = ListingService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.my_listings(&user.id).await?))
}

/// Partially updates one of the landowner's listings.
pub async fn update_listing(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    request: web::Json<UpdateListingRequest>,
) -> Result<HttpResponse, ListingError> {
    request.validate()?;

    let service = ListingService::new(pool.get_ref().clone());
    let listing = service
        .update_listing(&user.id, &path.into_inner(), &request)
        .await?;

    Ok(HttpResponse::Ok().json(listing))
}

/// Deletes one of the landowner's listings.
pub async fn delete_listing(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ListingError> {
    let listing_id = path.into_inner();
    let service = ListingService::new(pool.get_ref().clone());
    service.delete_listing(&user.id, &listing_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Listing deleted",
        "id": listing_id
    })))
}

/// One listing with its owner's name.
pub async fn get_listing(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ListingError> {
    let service = ListingService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.get_listing(&path.into_inner()).await?))
}

/// Every listing, newest first.
pub async fn all_listings(pool: web::Data<PgPool>) -> Result<HttpResponse, ListingError> {
    let service = ListingService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.all_listings().await?))
}

/// Listings accepting bookings.
pub async fn available_listings(pool: web::Data<PgPool>) -> Result<HttpResponse, ListingError> {
    let service = ListingService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.available_listings().await?))
}

/// Best rated available listings.
pub async fn featured_listings(pool: web::Data<PgPool>) -> Result<HttpResponse, ListingError> {
    let service = ListingService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.featured_listings().await?))
}

/// Listings whose location contains `q`.
pub async fn search_listings(
    pool: web::Data<PgPool>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ListingError> {
    let service = ListingService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.search_by_location(&query.q).await?))
}

/// Faceted listing filter.
pub async fn filter_listings(
    pool: web::Data<PgPool>,
    query: web::Query<FilterQuery>,
) -> Result<HttpResponse, ListingError> {
    let filter = ListingFilter::from(query.into_inner());
    let service = ListingService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.filter_listings(&filter).await?))
}

/// Adds or replaces the caller's review of a listing.
pub async fn add_review(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    request: web::Json<ReviewRequest>,
) -> Result<HttpResponse, ListingError> {
    request.validate()?;

    let service = ReviewService::new(pool.get_ref().clone());
    let reviews = service
        .add_or_update_review(&user.id, &path.into_inner(), &request)
        .await?;

    Ok(HttpResponse::Ok().json(reviews))
}

/// Reviews of a listing, newest first.
pub async fn listing_reviews(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ListingError> {
    let service = ReviewService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.listing_reviews(&path.into_inner()).await?))
}

/// Removes the caller's review of a listing.
pub async fn remove_review(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ListingError> {
    let service = ReviewService::new(pool.get_ref().clone());
    let reviews = service.remove_review(&user.id, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

/// Saves a listing for later.
pub async fn save_listing(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ListingError> {
    let service = SavedListingService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.save_listing(&user.id, &path.into_inner()).await?))
}

/// Removes a listing from the saved list.
pub async fn unsave_listing(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ListingError> {
    let service = SavedListingService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.unsave_listing(&user.id, &path.into_inner()).await?))
}

/// The caller's saved listings.
pub async fn saved_listings(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ListingError> {
    let service = SavedListingService::new(pool.get_ref().clone());
    Ok(HttpResponse::Ok().json(service.saved_listings(&user.id).await?))
}
