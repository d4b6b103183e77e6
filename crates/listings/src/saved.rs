use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ListingError;
use crate::types::{LISTING_COLUMNS, Listing};

/// Result of a save/unsave toggle.
#[derive(Debug, Serialize)]
pub struct SavedState {
    /// Whether the listing is now saved
    pub saved: bool,
    /// How many listings the user has saved
    pub total_saved: i64,
}

/// A traveler's bookmarked listings.
pub struct SavedListingService {
    pool: PgPool,
}

impl SavedListingService {
    /// Creates a new instance with the provided database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, user_id: &Uuid) -> Result<i64, ListingError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM saved_listings WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// Saves a listing. Saving twice is a no-op.
    pub async fn save_listing(&self, user_id: &Uuid, listing_id: &Uuid) -> Result<SavedState, ListingError> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM listings WHERE id = $1")
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(ListingError::NotFound);
        }

        sqlx::query(
            "INSERT INTO saved_listings (user_id, listing_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, listing_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(listing_id)
        .execute(&self.pool)
        .await?;

        Ok(SavedState {
            saved: true,
            total_saved: self.count(user_id).await?,
        })
    }

    /// Removes a listing from the saved list.
    pub async fn unsave_listing(&self, user_id: &Uuid, listing_id: &Uuid) -> Result<SavedState, ListingError> {
        sqlx::query("DELETE FROM saved_listings WHERE user_id = $1 AND listing_id = $2")
            .bind(user_id)
            .bind(listing_id)
            .execute(&self.pool)
            .await?;

        Ok(SavedState {
            saved: false,
            total_saved: self.count(user_id).await?,
        })
    }

    /// Saved listings, most recently saved first.
    pub async fn saved_listings(&self, user_id: &Uuid) -> Result<Vec<Listing>, ListingError> {
        let listings = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS}, u.name AS owner_name \
             FROM saved_listings s \
             JOIN listings l ON l.id = s.listing_id \
             JOIN users u ON u.id = l.owner_id \
             WHERE s.user_id = $1 ORDER BY s.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }
}
