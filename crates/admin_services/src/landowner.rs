use sqlx::PgPool;
use uuid::Uuid;

use payments::{TRANSACTION_LIST_COLUMNS, TRANSACTION_LIST_FROM, Transaction};

use crate::error::AdminError;
use crate::service::LAST_12_MONTHS;
use crate::types::{CompletedStay, LandownerEarnings, LandownerOverview, MonthlyEarnings};

/// Aggregates shown on a landowner's dashboard.
pub struct LandownerDashboard {
    pool: PgPool,
}

impl LandownerDashboard {
    /// Creates a new instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Listing count, completed stays and their earnings.
    pub async fn overview(&self, owner_id: &Uuid) -> Result<LandownerOverview, AdminError> {
        let total_listings: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;

        let stays = sqlx::query_as::<_, CompletedStay>(
            r#"
            SELECT b.id AS booking_id, u.name AS traveler_name, l.spot,
                   b.check_in, b.check_out, b.owner_amount_cents
            FROM bookings b
            JOIN listings l ON l.id = b.listing_id
            JOIN users u ON u.id = b.user_id
            WHERE l.owner_id = $1 AND b.is_verified AND b.booking_status = 'completed'
            ORDER BY b.created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let total_earnings_cents = stays.iter().map(|s| s.owner_amount_cents).sum();

        Ok(LandownerOverview {
            total_listings,
            total_bookings: stays.len() as i64,
            total_earnings_cents,
            bookings: stays.into_iter().map(Into::into).collect(),
        })
    }

    /// Owner share received, in total and per month.
    pub async fn earnings(&self, owner_id: &Uuid) -> Result<LandownerEarnings, AdminError> {
        let (transaction_count, total_earnings_cents): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(owner_amount_cents), 0)::BIGINT FROM transactions \
             WHERE receive_user_id = $1 AND payment_status = 'completed'",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        let monthly = sqlx::query_as::<_, MonthlyEarnings>(&format!(
            "SELECT to_char(m.month, 'YYYY-MM') AS month, \
                    COALESCE(SUM(t.amount_cents), 0)::BIGINT AS gross_cents, \
                    COALESCE(SUM(t.platform_fee_cents), 0)::BIGINT AS platform_fee_cents, \
                    COALESCE(SUM(t.owner_amount_cents), 0)::BIGINT AS owner_amount_cents \
             FROM {LAST_12_MONTHS} \
             LEFT JOIN transactions t ON date_trunc('month', t.created_at) = m.month \
                  AND t.receive_user_id = $1 AND t.payment_status = 'completed' \
             GROUP BY m.month ORDER BY m.month"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(LandownerEarnings {
            total_earnings_cents,
            transaction_count,
            monthly,
        })
    }

    /// Ledger entries paid to the landowner, newest first.
    pub async fn transactions(&self, owner_id: &Uuid) -> Result<Vec<Transaction>, AdminError> {
        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_LIST_COLUMNS} FROM {TRANSACTION_LIST_FROM} \
             WHERE t.receive_user_id = $1 ORDER BY t.created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }
}
