use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use auth_services::types::{Role, UserInfo};
use bookings::Booking;

use crate::error::AdminError;

/// Default page size of the user list.
pub const DEFAULT_PAGE_SIZE: i64 = 10;
/// Largest page size of the user list.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Headline numbers of the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    /// Registered users
    pub total_users: i64,
    /// Listings
    pub total_listings: i64,
    /// Bookings in any state
    pub total_bookings: i64,
    /// Platform fees of completed transactions, in cents
    pub total_earnings_cents: i64,
}

/// Number of rows in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    /// Status name
    pub status: String,
    /// Rows in that status
    pub count: i64,
}

/// Number of rows created in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct MonthlyCount {
    /// `YYYY-MM`
    pub month: String,
    /// Rows created that month
    pub count: i64,
}

/// Booking breakdowns of the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct BookingStats {
    /// Bookings per booking status
    pub by_booking_status: Vec<StatusCount>,
    /// Bookings per payment status
    pub by_payment_status: Vec<StatusCount>,
    /// Bookings created per month, last 12 months, oldest first
    pub monthly: Vec<MonthlyCount>,
}

/// Money moved in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct MonthlyEarnings {
    /// `YYYY-MM`
    pub month: String,
    /// Charged to travelers, in cents
    pub gross_cents: i64,
    /// Kept by the platform, in cents
    pub platform_fee_cents: i64,
    /// Paid out to owners, in cents
    pub owner_amount_cents: i64,
}

/// Totals over completed transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct EarningTotals {
    /// Completed transactions
    pub transaction_count: i64,
    /// Charged to travelers, in cents
    pub gross_volume_cents: i64,
    /// Kept by the platform, in cents
    pub platform_earnings_cents: i64,
    /// Paid out to owners, in cents
    pub owner_payouts_cents: i64,
}

/// Earnings page of the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct EarningStats {
    /// All-time totals
    #[serde(flatten)]
    pub totals: EarningTotals,
    /// Last 12 months, oldest first
    pub monthly: Vec<MonthlyEarnings>,
}

/// An entry of the recent activity feed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Activity {
    /// `signup`, `booking` or `listing`
    pub kind: String,
    /// Id of the user, booking or listing
    pub id: Uuid,
    /// Human readable summary
    pub title: String,
    /// When it happened
    pub created_at: DateTime<Utc>,
}

/// Query of the paginated user list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    /// 1-based page
    pub page: Option<i64>,
    /// Page size
    pub limit: Option<i64>,
    /// Only users with this role
    pub role: Option<Role>,
}

impl UserListQuery {
    /// Page and page size clamped to sane values.
    pub fn page_and_limit(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }

    /// Rows to skip for the requested page.
    pub fn offset(&self) -> i64 {
        let (page, limit) = self.page_and_limit();
        (page - 1).saturating_mul(limit)
    }
}

/// One page of users.
#[derive(Debug, Serialize)]
pub struct UserPage {
    /// Users on this page
    pub users: Vec<UserInfo>,
    /// Users matching the filter
    pub total: i64,
    /// This page
    pub page: i64,
    /// Page size
    pub limit: i64,
    /// Pages available
    pub total_pages: i64,
}

/// Query of the user search.
#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    /// Substring of the name or email
    #[serde(alias = "query")]
    pub q: String,
}

/// A booking with the traveler's name, for admin views.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookingOverview {
    /// The booking, with the listing spot and location
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub booking: Booking,
    /// Name of the traveler
    pub traveler_name: String,
}

/// Editable website pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// About us
    AboutUs,
    /// Privacy policy
    PrivacyPolicy,
    /// Terms and conditions
    TermsAndConditions,
}

impl ContentKind {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::AboutUs => "about_us",
            ContentKind::PrivacyPolicy => "privacy_policy",
            ContentKind::TermsAndConditions => "terms_and_conditions",
        }
    }

    /// Parses a URL slug (`about-us`, `privacy-policy`, `terms-conditions`).
    pub fn from_slug(slug: &str) -> Result<Self, AdminError> {
        match slug {
            "about-us" => Ok(ContentKind::AboutUs),
            "privacy-policy" => Ok(ContentKind::PrivacyPolicy),
            "terms-conditions" | "terms-and-conditions" => Ok(ContentKind::TermsAndConditions),
            other => Err(AdminError::UnknownContent(other.to_string())),
        }
    }
}

/// A stored website page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WebsiteContent {
    /// Page kind
    pub kind: String,
    /// Page text
    pub text: String,
    /// Last edit
    pub updated_at: DateTime<Utc>,
}

/// Body of a page update.
#[derive(Debug, Deserialize, Validate)]
pub struct ContentRequest {
    /// New page text
    #[validate(length(min = 1, max = 100000, message = "Content must be 1-100000 characters"))]
    pub text: String,
}

/// A paid stay on one of the landowner's listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CompletedStay {
    /// Booking id
    pub booking_id: Uuid,
    /// Traveler name
    pub traveler_name: String,
    /// Listing spot
    pub spot: String,
    /// First night
    pub check_in: NaiveDate,
    /// Departure day
    pub check_out: NaiveDate,
    /// Owner share, in cents
    pub owner_amount_cents: i64,
}

impl CompletedStay {
    /// `Jul 1, 2030 - Jul 4, 2030`
    pub fn date_range(&self) -> String {
        format!(
            "{} - {}",
            self.check_in.format("%b %-d, %Y"),
            self.check_out.format("%b %-d, %Y")
        )
    }
}

/// Landowner dashboard overview.
#[derive(Debug, Serialize)]
pub struct LandownerOverview {
    /// Listings owned
    pub total_listings: i64,
    /// Completed stays
    pub total_bookings: i64,
    /// Owner share of completed stays, in cents
    pub total_earnings_cents: i64,
    /// Completed stays, newest first
    pub bookings: Vec<CompletedStayView>,
}

/// A completed stay as shown on the dashboard.
#[derive(Debug, Serialize)]
pub struct CompletedStayView {
    /// The stay
    #[serde(flatten)]
    pub stay: CompletedStay,
    /// Formatted date range
    pub booking_date_range: String,
}

impl From<CompletedStay> for CompletedStayView {
    fn from(stay: CompletedStay) -> Self {
        let booking_date_range = stay.date_range();
        Self {
            stay,
            booking_date_range,
        }
    }
}

/// Landowner earnings page.
#[derive(Debug, Serialize)]
pub struct LandownerEarnings {
    /// Owner share received, all time, in cents
    pub total_earnings_cents: i64,
    /// Completed transactions received
    pub transaction_count: i64,
    /// Owner share per month, last 12 months, oldest first
    pub monthly: Vec<MonthlyEarnings>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_clamping() {
        assert_eq!(UserListQuery::default().page_and_limit(), (1, DEFAULT_PAGE_SIZE));

        let query = UserListQuery {
            page: Some(0),
            limit: Some(1000),
            role: None,
        };
        assert_eq!(query.page_and_limit(), (1, MAX_PAGE_SIZE));
    }

    #[test]
    fn test_offset_saturates_on_huge_page() {
        let query = UserListQuery {
            page: Some(i64::MAX),
            limit: Some(MAX_PAGE_SIZE),
            role: None,
        };
        assert_eq!(query.offset(), i64::MAX);

        let query = UserListQuery {
            page: Some(3),
            limit: Some(20),
            role: None,
        };
        assert_eq!(query.offset(), 40);
    }

    #[test]
    fn test_user_list_role_filter_parses() {
        let query: UserListQuery =
            serde_json::from_value(serde_json::json!({ "role": "landowner", "page": 2 })).unwrap();
        assert_eq!(query.role, Some(Role::Landowner));
        assert_eq!(query.page_and_limit(), (2, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_content_slugs() {
        assert_eq!(ContentKind::from_slug("about-us").unwrap(), ContentKind::AboutUs);
        assert_eq!(
            ContentKind::from_slug("terms-conditions").unwrap().as_str(),
            "terms_and_conditions"
        );
        assert!(matches!(
            ContentKind::from_slug("faq"),
            Err(AdminError::UnknownContent(_))
        ));
    }

    #[test]
    fn test_completed_stay_date_range() {
        let stay = CompletedStay {
            booking_id: Uuid::nil(),
            traveler_name: "Sam".to_string(),
            spot: "Lakeside Pad".to_string(),
            check_in: NaiveDate::from_ymd_opt(2030, 7, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2030, 7, 4).unwrap(),
            owner_amount_cents: 13_095,
        };
        assert_eq!(stay.date_range(), "Jul 1, 2030 - Jul 4, 2030");
    }

    #[test]
    fn test_content_request_validation() {
        let empty = ContentRequest {
            text: String::new(),
        };
        assert!(empty.validate().is_err());
    }
}
