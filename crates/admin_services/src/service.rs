use log::info;
use sqlx::PgPool;
use uuid::Uuid;

use auth_services::types::{Role, USER_COLUMNS, User, UserInfo};
use bookings::BOOKING_COLUMNS;
use listings::{LISTING_COLUMNS, Listing};
use payments::{TRANSACTION_LIST_COLUMNS, TRANSACTION_LIST_FROM, Transaction};

use crate::error::AdminError;
use crate::types::{
    Activity, BookingOverview, BookingStats, DashboardStats, EarningStats, EarningTotals,
    MonthlyCount, MonthlyEarnings, StatusCount, UserListQuery, UserPage,
};

/// Entries of each kind merged into the activity feed.
pub const RECENT_ACTIVITY_LIMIT: i64 = 10;
/// Most users returned by an admin search.
pub const ADMIN_SEARCH_LIMIT: i64 = 50;

/// Last 12 calendar months, including the current one, as `m.month`.
pub(crate) const LAST_12_MONTHS: &str = "generate_series(\
     date_trunc('month', NOW()) - INTERVAL '11 months', \
     date_trunc('month', NOW()), INTERVAL '1 month') AS m(month)";

/// Admin dashboards and moderation.
pub struct AdminService {
    pool: PgPool,
}

/// Number of pages needed for `total` rows.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 { 0 } else { (total + limit - 1) / limit }
}

impl AdminService {
    /// Creates a new instance with the provided database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Headline counts and platform earnings.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, AdminError> {
        let (total_users, total_listings, total_bookings, total_earnings_cents): (
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM listings),
                (SELECT COUNT(*) FROM bookings),
                (SELECT COALESCE(SUM(platform_fee_cents), 0)::BIGINT
                 FROM transactions WHERE payment_status = 'completed')
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardStats {
            total_users,
            total_listings,
            total_bookings,
            total_earnings_cents,
        })
    }

    /// Booking counts per status and per month.
    pub async fn booking_stats(&self) -> Result<BookingStats, AdminError> {
        let by_booking_status = sqlx::query_as::<_, StatusCount>(
            "SELECT booking_status AS status, COUNT(*) AS count FROM bookings \
             GROUP BY booking_status ORDER BY booking_status",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_payment_status = sqlx::query_as::<_, StatusCount>(
            "SELECT payment_status AS status, COUNT(*) AS count FROM bookings \
             GROUP BY payment_status ORDER BY payment_status",
        )
        .fetch_all(&self.pool)
        .await?;

        let monthly = sqlx::query_as::<_, MonthlyCount>(&format!(
            "SELECT to_char(m.month, 'YYYY-MM') AS month, COUNT(b.id) AS count \
             FROM {LAST_12_MONTHS} \
             LEFT JOIN bookings b ON date_trunc('month', b.created_at) = m.month \
             GROUP BY m.month ORDER BY m.month"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(BookingStats {
            by_booking_status,
            by_payment_status,
            monthly,
        })
    }

    /// Gross volume, platform earnings and owner payouts.
    pub async fn earning_stats(&self) -> Result<EarningStats, AdminError> {
        let totals = sqlx::query_as::<_, EarningTotals>(
            r#"
            SELECT COUNT(*) AS transaction_count,
                   COALESCE(SUM(amount_cents), 0)::BIGINT AS gross_volume_cents,
                   COALESCE(SUM(platform_fee_cents), 0)::BIGINT AS platform_earnings_cents,
                   COALESCE(SUM(owner_amount_cents), 0)::BIGINT AS owner_payouts_cents
            FROM transactions
            WHERE payment_status = 'completed'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let monthly = sqlx::query_as::<_, MonthlyEarnings>(&format!(
            "SELECT to_char(m.month, 'YYYY-MM') AS month, \
                    COALESCE(SUM(t.amount_cents), 0)::BIGINT AS gross_cents, \
                    COALESCE(SUM(t.platform_fee_cents), 0)::BIGINT AS platform_fee_cents, \
                    COALESCE(SUM(t.owner_amount_cents), 0)::BIGINT AS owner_amount_cents \
             FROM {LAST_12_MONTHS} \
             LEFT JOIN transactions t ON date_trunc('month', t.created_at) = m.month \
                  AND t.payment_status = 'completed' \
             GROUP BY m.month ORDER BY m.month"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(EarningStats { totals, monthly })
    }

    /// Latest signups, bookings and listings, newest first.
    pub async fn recent_activities(&self) -> Result<Vec<Activity>, AdminError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT kind, id, title, created_at FROM (
                (SELECT 'signup' AS kind, id, 'New ' || role || ': ' || name AS title, created_at
                 FROM users ORDER BY created_at DESC LIMIT $1)
                UNION ALL
                (SELECT 'booking', b.id, u.name || ' booked ' || l.spot, b.created_at
                 FROM bookings b
                 JOIN users u ON u.id = b.user_id
                 JOIN listings l ON l.id = b.listing_id
                 ORDER BY b.created_at DESC LIMIT $1)
                UNION ALL
                (SELECT 'listing', id, 'New listing: ' || spot, created_at
                 FROM listings ORDER BY created_at DESC LIMIT $1)
            ) feed
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(RECENT_ACTIVITY_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }

    /// One page of users, newest first, optionally of one role.
    pub async fn list_users(&self, query: &UserListQuery) -> Result<UserPage, AdminError> {
        let (page, limit) = query.page_and_limit();
        let role = query.role.map(|r| r.as_str());

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE $1::TEXT IS NULL OR role = $1")
                .bind(role)
                .fetch_one(&self.pool)
                .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE $1::TEXT IS NULL OR role = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(role)
        .bind(limit)
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(UserPage {
            users: users.into_iter().map(UserInfo::from).collect(),
            total,
            page,
            limit,
            total_pages: total_pages(total, limit),
        })
    }

    /// Users whose name or email contains `query`.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserInfo>, AdminError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE name ILIKE $1 OR email ILIKE $1 \
             ORDER BY name ASC LIMIT $2"
        ))
        .bind(listings::service::like_pattern(query))
        .bind(ADMIN_SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(users.into_iter().map(UserInfo::from).collect())
    }

    async fn load_user(&self, user_id: &Uuid) -> Result<User, AdminError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AdminError::UserNotFound)
    }

    /// One user.
    pub async fn get_user(&self, user_id: &Uuid) -> Result<UserInfo, AdminError> {
        Ok(self.load_user(user_id).await?.into())
    }

    async fn moderatable(&self, user_id: &Uuid) -> Result<User, AdminError> {
        let user = self.load_user(user_id).await?;
        if user.role == Role::Admin {
            return Err(AdminError::ProtectedAccount);
        }
        Ok(user)
    }

    /// Suspends a non-admin account and revokes its sessions.
    pub async fn suspend_user(&self, user_id: &Uuid) -> Result<UserInfo, AdminError> {
        self.moderatable(user_id).await?;

        let mut tx = self.pool.begin().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = FALSE, is_online = FALSE, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("🚫 Suspended user {}", user_id);
        Ok(user.into())
    }

    /// Reactivates a suspended account.
    pub async fn activate_user(&self, user_id: &Uuid) -> Result<UserInfo, AdminError> {
        self.moderatable(user_id).await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = TRUE, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        info!("✅ Activated user {}", user_id);
        Ok(user.into())
    }

    /// Deletes a non-admin account with everything it owns. Ledger entries
    /// survive with the deleted party unset.
    pub async fn delete_user(&self, user_id: &Uuid) -> Result<(), AdminError> {
        self.moderatable(user_id).await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        info!("🗑️ Deleted user {}", user_id);
        Ok(())
    }

    /// Every listing with its owner's name, newest first.
    pub async fn all_listings(&self) -> Result<Vec<Listing>, AdminError> {
        let listings = sqlx::query_as::<_, Listing>(&format!(
            "SELECT {LISTING_COLUMNS}, u.name AS owner_name \
             FROM listings l JOIN users u ON u.id = l.owner_id \
             ORDER BY l.created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }

    /// Every booking with traveler name and listing spot, newest first.
    pub async fn all_bookings(&self) -> Result<Vec<BookingOverview>, AdminError> {
        let bookings = sqlx::query_as::<_, BookingOverview>(&format!(
            "SELECT {BOOKING_COLUMNS}, l.spot, l.location, u.name AS traveler_name \
             FROM bookings b \
             JOIN listings l ON l.id = b.listing_id \
             JOIN users u ON u.id = b.user_id \
             ORDER BY b.created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    /// Every ledger entry, newest first.
    pub async fn all_transactions(&self) -> Result<Vec<Transaction>, AdminError> {
        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_LIST_COLUMNS} FROM {TRANSACTION_LIST_FROM} \
             ORDER BY t.created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }
}
