use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ListingError;
use crate::types::{
    CreateListingRequest, LISTING_COLUMNS, Listing, ListingFilter, UpdateListingRequest,
};

/// Featured listings returned by the home page query.
pub const FEATURED_LIMIT: i64 = 8;

/// Listing CRUD and public discovery.
pub struct ListingService {
    pool: PgPool,
}

impl ListingService {
    /// Creates a new instance with the provided database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a listing owned by `owner_id`.
    pub async fn create_listing(
        &self,
        owner_id: &Uuid,
        request: &CreateListingRequest,
    ) -> Result<Listing, ListingError> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            INSERT INTO listings AS l (
                owner_id, location, latitude, longitude, images, spot, amenities,
                rv_types, max_slides, site_types, site_lengths, description,
                is_available, price_cents
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(request.location.trim())
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(&request.images)
        .bind(request.spot.trim())
        .bind(&request.amenities)
        .bind(&request.rv_types)
        .bind(&request.max_slides)
        .bind(&request.site_types)
        .bind(&request.site_lengths)
        .bind(request.description.trim())
        .bind(request.is_available)
        .bind(request.price_cents)
        .fetch_one(&self.pool)
        .await?;

        log::info!("🏕️ Listing {} created by {}", listing.id, owner_id);
        Ok(listing)
    }

    /// Listings owned by `owner_id`, newest first.
    pub async fn my_listings(&self, owner_id: &Uuid) -> Result<Vec<Listing>, ListingError> {
        let listings = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings l WHERE l.owner_id = $1 \
             ORDER BY l.created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }

    /// Fetches one listing with its owner's name.
    pub async fn get_listing(&self, listing_id: &Uuid) -> Result<Listing, ListingError> {
        sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS}, u.name AS owner_name \
             FROM listings l JOIN users u ON u.id = l.owner_id WHERE l.id = $1"
        ))
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ListingError::NotFound)
    }

    async fn ensure_owner(&self, owner_id: &Uuid, listing_id: &Uuid) -> Result<(), ListingError> {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM listings WHERE id = $1")
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await?;

        match owner {
            None => Err(ListingError::NotFound),
            Some(owner) if owner != *owner_id => Err(ListingError::NotOwner),
            Some(_) => Ok(()),
        }
    }

    /// Applies a partial update. Only the owner may update.
    pub async fn update_listing(
        &self,
        owner_id: &Uuid,
        listing_id: &Uuid,
        request: &UpdateListingRequest,
    ) -> Result<Listing, ListingError> {
        self.ensure_owner(owner_id, listing_id).await?;

        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            UPDATE listings AS l
            SET location = COALESCE($1, l.location),
                latitude = COALESCE($2, l.latitude),
                longitude = COALESCE($3, l.longitude),
                images = COALESCE($4, l.images),
                spot = COALESCE($5, l.spot),
                amenities = COALESCE($6, l.amenities),
                rv_types = COALESCE($7, l.rv_types),
                max_slides = COALESCE($8, l.max_slides),
                site_types = COALESCE($9, l.site_types),
                site_lengths = COALESCE($10, l.site_lengths),
                description = COALESCE($11, l.description),
                is_available = COALESCE($12, l.is_available),
                price_cents = COALESCE($13, l.price_cents),
                updated_at = NOW()
            WHERE l.id = $14
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(request.location.as_deref().map(str::trim))
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(&request.images)
        .bind(request.spot.as_deref().map(str::trim))
        .bind(&request.amenities)
        .bind(&request.rv_types)
        .bind(&request.max_slides)
        .bind(&request.site_types)
        .bind(&request.site_lengths)
        .bind(request.description.as_deref().map(str::trim))
        .bind(request.is_available)
        .bind(request.price_cents)
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ListingError::NotFound)?;

        Ok(listing)
    }

    /// Deletes a listing. Only the owner may delete.
    pub async fn delete_listing(&self, owner_id: &Uuid, listing_id: &Uuid) -> Result<(), ListingError> {
        self.ensure_owner(owner_id, listing_id).await?;

        sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(listing_id)
            .execute(&self.pool)
            .await?;

        log::info!("🗑️ Listing {} deleted by {}", listing_id, owner_id);
        Ok(())
    }

    /// Every listing, newest first.
    pub async fn all_listings(&self) -> Result<Vec<Listing>, ListingError> {
        self.discover("TRUE", None).await
    }

    /// Listings currently accepting bookings, newest first.
    pub async fn available_listings(&self) -> Result<Vec<Listing>, ListingError> {
        self.discover("l.is_available", None).await
    }

    /// Best-rated available listings.
    pub async fn featured_listings(&self) -> Result<Vec<Listing>, ListingError> {
        let listings = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS}, u.name AS owner_name \
             FROM listings l JOIN users u ON u.id = l.owner_id \
             WHERE l.is_available \
             ORDER BY l.average_rating DESC, l.total_ratings DESC, l.created_at DESC \
             LIMIT $1"
        ))
        .bind(FEATURED_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }

    /// Listings whose location contains `query`, case-insensitively.
    pub async fn search_by_location(&self, query: &str) -> Result<Vec<Listing>, ListingError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ListingError::Validation(
                "Search query is required".to_string(),
            ));
        }

        self.discover("l.location ILIKE $1", Some(like_pattern(query)))
            .await
    }

    async fn discover(
        &self,
        condition: &str,
        pattern: Option<String>,
    ) -> Result<Vec<Listing>, ListingError> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS}, u.name AS owner_name \
             FROM listings l JOIN users u ON u.id = l.owner_id \
             WHERE {condition} ORDER BY l.created_at DESC"
        );
        let mut query = sqlx::query_as::<_, Listing>(&sql);
        if let Some(pattern) = pattern {
            query = query.bind(pattern);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Applies the faceted filter. Amenities must all match; the other
    /// facets match when they share any value.
    pub async fn filter_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>, ListingError> {
        let listings = sqlx::query_as::<_, Listing>(&format!(
            r#"
            SELECT {LISTING_COLUMNS}, u.name AS owner_name
            FROM listings l JOIN users u ON u.id = l.owner_id
            WHERE ($1::BIGINT IS NULL OR l.price_cents >= $1)
              AND ($2::BIGINT IS NULL OR l.price_cents <= $2)
              AND ($3::FLOAT8 IS NULL OR l.average_rating >= $3)
              AND (cardinality($4::TEXT[]) = 0 OR l.amenities @> $4)
              AND (cardinality($5::TEXT[]) = 0 OR l.site_types && $5)
              AND (cardinality($6::TEXT[]) = 0 OR l.rv_types && $6)
              AND (cardinality($7::TEXT[]) = 0 OR l.site_lengths && $7)
              AND (cardinality($8::TEXT[]) = 0 OR l.max_slides && $8)
            ORDER BY l.created_at DESC
            "#
        ))
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.min_rating)
        .bind(&filter.amenities)
        .bind(&filter.site_types)
        .bind(&filter.rv_types)
        .bind(&filter.site_lengths)
        .bind(&filter.max_slides)
        .fetch_all(&self.pool)
        .await?;

        log::debug!("Filter {:?} matched {} listings", filter, listings.len());
        Ok(listings)
    }
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards escaped.
pub fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Moab"), "%Moab%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
