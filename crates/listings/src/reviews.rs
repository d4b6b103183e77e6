use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::ListingError;
use crate::types::{ListingReviews, Review, ReviewRequest, round_rating};

const REVIEW_COLUMNS: &str = "r.id, r.listing_id, r.user_id, r.rating, r.review, \
     u.name AS user_name, u.email AS user_email, r.created_at, r.updated_at";

/// One review per user per listing, with the listing's aggregate kept in sync.
pub struct ReviewService {
    pool: PgPool,
}

impl ReviewService {
    /// Creates a new instance with the provided database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Adds the caller's review or replaces their previous one.
    pub async fn add_or_update_review(
        &self,
        user_id: &Uuid,
        listing_id: &Uuid,
        request: &ReviewRequest,
    ) -> Result<ListingReviews, ListingError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT owner_id FROM listings WHERE id = $1 FOR UPDATE")
                .bind(listing_id)
                .fetch_optional(&mut *tx)
                .await?;

        match owner {
            None => return Err(ListingError::NotFound),
            Some(owner) if owner == *user_id => return Err(ListingError::OwnListing),
            Some(_) => {}
        }

        sqlx::query(
            r#"
            INSERT INTO listing_reviews (listing_id, user_id, rating, review)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (listing_id, user_id)
            DO UPDATE SET rating = EXCLUDED.rating, review = EXCLUDED.review, updated_at = NOW()
            "#,
        )
        .bind(listing_id)
        .bind(user_id)
        .bind(request.rating)
        .bind(request.review.trim())
        .execute(&mut *tx)
        .await?;

        refresh_aggregate(&mut tx, listing_id).await?;
        tx.commit().await?;

        self.listing_reviews(listing_id).await
    }

    /// Removes the caller's review.
    pub async fn remove_review(
        &self,
        user_id: &Uuid,
        listing_id: &Uuid,
    ) -> Result<ListingReviews, ListingError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM listings WHERE id = $1 FOR UPDATE")
                .bind(listing_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(ListingError::NotFound);
        }

        let removed = sqlx::query("DELETE FROM listing_reviews WHERE listing_id = $1 AND user_id = $2")
            .bind(listing_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(ListingError::ReviewNotFound);
        }

        refresh_aggregate(&mut tx, listing_id).await?;
        tx.commit().await?;

        self.listing_reviews(listing_id).await
    }

    /// Reviews of a listing, newest first, with reviewer name and email.
    pub async fn listing_reviews(&self, listing_id: &Uuid) -> Result<ListingReviews, ListingError> {
        let header: Option<(String, String, f64, i32)> = sqlx::query_as(
            "SELECT spot, location, average_rating, total_ratings FROM listings WHERE id = $1",
        )
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        let (spot, location, average_rating, total_ratings) =
            header.ok_or(ListingError::NotFound)?;

        let reviews = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM listing_reviews r JOIN users u ON u.id = r.user_id \
             WHERE r.listing_id = $1 ORDER BY r.created_at DESC"
        ))
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ListingReviews {
            listing_id: *listing_id,
            spot,
            location,
            average_rating,
            total_ratings,
            reviews,
        })
    }

    /// Reviews across every listing owned by `owner_id`, newest first.
    pub async fn reviews_for_owner(&self, owner_id: &Uuid) -> Result<Vec<Review>, ListingError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM listing_reviews r \
             JOIN users u ON u.id = r.user_id \
             JOIN listings l ON l.id = r.listing_id \
             WHERE l.owner_id = $1 ORDER BY r.created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }
}

async fn refresh_aggregate(
    tx: &mut Transaction<'_, Postgres>,
    listing_id: &Uuid,
) -> Result<(), ListingError> {
    let (average, count): (Option<f64>, i64) = sqlx::query_as(
        "SELECT AVG(rating)::FLOAT8, COUNT(*) FROM listing_reviews WHERE listing_id = $1",
    )
    .bind(listing_id)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE listings SET average_rating = $1, total_ratings = $2, updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(round_rating(average.unwrap_or(0.0)))
    .bind(count as i32)
    .bind(listing_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
