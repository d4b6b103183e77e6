use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use notification_services::NotificationService;

use crate::dates::{DateRange, ExistingStay, find_conflict};
use crate::error::BookingError;
use crate::types::{
    BOOKING_COLUMNS, BookedRange, Booking, BookingCodeIssued, BookingStatus,
    CreateBookingRequest, PaymentStatus,
};

/// Minutes a booking confirmation code stays valid.
pub const BOOKING_CODE_TTL_MINUTES: i64 = 10;
/// Wrong codes tolerated; the next wrong code cancels the booking.
pub const MAX_BOOKING_CODE_ATTEMPTS: i32 = 3;

/// Outcome of checking a submitted confirmation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    /// Code matches and is in time
    Accepted,
    /// Wrong code; `attempts` is the new wrong-attempt count
    Wrong {
        /// Wrong attempts including this one
        attempts: i32,
    },
    /// Wrong code beyond the attempt budget
    Exhausted,
    /// Deadline passed
    Expired,
}

/// Checks `submitted` against the booking's outstanding code.
pub fn check_booking_code(booking: &Booking, submitted: &str, now: DateTime<Utc>) -> CodeCheck {
    if booking.verification_deadline <= now {
        return CodeCheck::Expired;
    }

    match booking.verification_code.as_deref() {
        Some(code) if code == submitted.trim() => CodeCheck::Accepted,
        _ => {
            let attempts = booking.verification_attempts + 1;
            if attempts > MAX_BOOKING_CODE_ATTEMPTS {
                CodeCheck::Exhausted
            } else {
                CodeCheck::Wrong { attempts }
            }
        }
    }
}

/// Cancels pending, unverified bookings whose confirmation deadline has
/// passed. Returns how many were cancelled.
pub async fn cancel_expired_bookings(pool: &PgPool) -> Result<u64, BookingError> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET booking_status = 'cancelled', verification_code = NULL, updated_at = NOW()
        WHERE booking_status = 'pending' AND NOT is_verified AND verification_deadline < NOW()
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Reservation lifecycle: creation with conflict detection, code
/// confirmation, cancellation and queries.
pub struct BookingService {
    pool: PgPool,
    notifications: NotificationService,
}

#[derive(sqlx::FromRow)]
struct BookingWithOwner {
    #[sqlx(flatten)]
    booking: Booking,
    owner_id: Uuid,
}

struct LockedListing {
    owner_id: Uuid,
    is_available: bool,
    price_cents: i64,
    spot: String,
}

impl BookingService {
    /// Creates a new instance over the pool and email service.
    pub fn new(pool: PgPool, notifications: NotificationService) -> Self {
        Self {
            pool,
            notifications,
        }
    }

    async fn lock_listing(
        tx: &mut Transaction<'_, Postgres>,
        listing_id: &Uuid,
    ) -> Result<LockedListing, BookingError> {
        let row: Option<(Uuid, bool, i64, String)> = sqlx::query_as(
            "SELECT owner_id, is_available, price_cents, spot FROM listings WHERE id = $1 FOR UPDATE",
        )
        .bind(listing_id)
        .fetch_optional(&mut **tx)
        .await?;

        let (owner_id, is_available, price_cents, spot) =
            row.ok_or(BookingError::ListingNotFound)?;
        Ok(LockedListing {
            owner_id,
            is_available,
            price_cents,
            spot,
        })
    }

    async fn ensure_no_conflict(
        tx: &mut Transaction<'_, Postgres>,
        listing_id: &Uuid,
        range: &DateRange,
        exclude: Option<Uuid>,
    ) -> Result<(), BookingError> {
        let existing = sqlx::query_as::<_, ExistingStay>(
            r#"
            SELECT id, check_in, check_out, booking_status, verification_deadline
            FROM bookings
            WHERE listing_id = $1
              AND booking_status IN ('pending', 'confirmed', 'completed')
              AND check_in < $3 AND check_out > $2
            "#,
        )
        .bind(listing_id)
        .bind(range.check_in())
        .bind(range.check_out())
        .fetch_all(&mut **tx)
        .await?;

        if let Some(conflict) = find_conflict(range, &existing, exclude, Utc::now()) {
            log::info!(
                "📅 Booking request {}..{} on {} conflicts with {}",
                range.check_in(),
                range.check_out(),
                listing_id,
                conflict.id
            );
            return Err(BookingError::DatesUnavailable);
        }
        Ok(())
    }

    async fn fetch_for_update(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: &Uuid,
    ) -> Result<Booking, BookingError> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(BookingError::NotFound)
    }

    /// Places a pending booking and emails its confirmation code.
    pub async fn create_booking(
        &self,
        traveler_id: &Uuid,
        listing_id: &Uuid,
        request: &CreateBookingRequest,
    ) -> Result<BookingCodeIssued, BookingError> {
        let range = DateRange::new(request.check_in, request.check_out)?;
        if range.check_in() < Utc::now().date_naive() {
            return Err(BookingError::InvalidDates(
                "Check-in cannot be in the past".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let listing = Self::lock_listing(&mut tx, listing_id).await?;
        if listing.owner_id == *traveler_id {
            return Err(BookingError::OwnListing);
        }
        if !listing.is_available {
            return Err(BookingError::ListingUnavailable);
        }

        Self::ensure_no_conflict(&mut tx, listing_id, &range, None).await?;

        let total_amount_cents = range.total_cents(listing.price_cents)?;
        let code = NotificationService::generate_verification_code();
        let deadline = Utc::now() + Duration::minutes(BOOKING_CODE_TTL_MINUTES);

        let booking_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO bookings (
                listing_id, user_id, email, name, city, postcode, phone_number, gender,
                check_in, check_out, verification_code, verification_deadline,
                total_amount_cents
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(listing_id)
        .bind(traveler_id)
        .bind(request.email.trim().to_lowercase())
        .bind(request.name.trim())
        .bind(request.city.trim())
        .bind(request.postcode.trim())
        .bind(request.phone_number.trim())
        .bind(request.gender.as_str())
        .bind(range.check_in())
        .bind(range.check_out())
        .bind(&code)
        .bind(deadline)
        .bind(total_amount_cents)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!(
            "📅 Booking {} created for listing {} ({} nights)",
            booking_id,
            listing_id,
            range.nights()
        );

        let email_sent = self
            .send_code(
                &request.email,
                &request.name,
                &listing.spot,
                &range,
                &code,
            )
            .await;

        Ok(BookingCodeIssued {
            message: if email_sent {
                "Booking created. Please check your email for the verification code.".to_string()
            } else {
                "Booking created, but the verification email could not be sent. Request a new code."
                    .to_string()
            },
            booking_id,
            verification_deadline: deadline,
            email_sent,
            total_amount_cents,
        })
    }

    async fn send_code(
        &self,
        email: &str,
        name: &str,
        spot: &str,
        range: &DateRange,
        code: &str,
    ) -> bool {
        match self
            .notifications
            .send_booking_verification_code(
                email,
                name,
                spot,
                &range.check_in().to_string(),
                &range.check_out().to_string(),
                code,
                BOOKING_CODE_TTL_MINUTES,
            )
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to send booking code to {}: {}", email, e);
                false
            }
        }
    }

    /// Confirms a pending booking with its emailed code.
    pub async fn verify_booking(
        &self,
        traveler_id: &Uuid,
        booking_id: &Uuid,
        code: &str,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await?;
        let booking = Self::fetch_for_update(&mut tx, booking_id).await?;

        if booking.user_id != *traveler_id {
            return Err(BookingError::Forbidden);
        }
        if booking.booking_status != BookingStatus::Pending || booking.is_verified {
            return Err(BookingError::NotAwaitingVerification);
        }

        match check_booking_code(&booking, code, Utc::now()) {
            CodeCheck::Expired => {
                cancel_in_tx(&mut tx, booking_id).await?;
                tx.commit().await?;
                log::info!("⌛ Booking {} cancelled: code expired", booking_id);
                Err(BookingError::CodeExpired)
            }
            CodeCheck::Exhausted => {
                cancel_in_tx(&mut tx, booking_id).await?;
                tx.commit().await?;
                log::info!("🚫 Booking {} cancelled: too many wrong codes", booking_id);
                Err(BookingError::TooManyAttempts)
            }
            CodeCheck::Wrong { attempts } => {
                sqlx::query(
                    "UPDATE bookings SET verification_attempts = $1, updated_at = NOW() WHERE id = $2",
                )
                .bind(attempts)
                .bind(booking_id)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                Err(BookingError::InvalidCode {
                    remaining: MAX_BOOKING_CODE_ATTEMPTS - attempts,
                })
            }
            CodeCheck::Accepted => {
                sqlx::query(
                    r#"
                    UPDATE bookings
                    SET is_verified = TRUE, booking_status = 'confirmed',
                        verification_code = NULL, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(booking_id)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;

                let booking = self.get_booking(traveler_id, booking_id, false).await?;
                log::info!("✅ Booking {} confirmed", booking_id);

                if let Err(e) = self
                    .notifications
                    .send_booking_confirmation(
                        &booking.email,
                        &booking.name,
                        booking.spot.as_deref().unwrap_or("your spot"),
                        &booking.check_in.to_string(),
                        &booking.check_out.to_string(),
                    )
                    .await
                {
                    log::warn!("Failed to send booking confirmation for {}: {}", booking_id, e);
                }

                Ok(booking)
            }
        }
    }

    /// Issues a fresh code and deadline for a pending, unverified booking.
    pub async fn resend_booking_code(
        &self,
        traveler_id: &Uuid,
        booking_id: &Uuid,
    ) -> Result<BookingCodeIssued, BookingError> {
        let mut tx = self.pool.begin().await?;
        let booking = Self::fetch_for_update(&mut tx, booking_id).await?;

        if booking.user_id != *traveler_id {
            return Err(BookingError::Forbidden);
        }
        if booking.booking_status != BookingStatus::Pending || booking.is_verified {
            return Err(BookingError::NotAwaitingVerification);
        }

        let range = DateRange::new(booking.check_in, booking.check_out)?;
        let listing = Self::lock_listing(&mut tx, &booking.listing_id).await?;

        // Once the deadline has passed the dates were released and may have been taken.
        if booking.verification_deadline <= Utc::now() {
            Self::ensure_no_conflict(&mut tx, &booking.listing_id, &range, Some(booking.id))
                .await?;
        }

        let code = NotificationService::generate_verification_code();
        let deadline = Utc::now() + Duration::minutes(BOOKING_CODE_TTL_MINUTES);

        sqlx::query(
            r#"
            UPDATE bookings
            SET verification_code = $1, verification_deadline = $2,
                verification_attempts = 0, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(&code)
        .bind(deadline)
        .bind(booking_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let email_sent = self
            .send_code(&booking.email, &booking.name, &listing.spot, &range, &code)
            .await;

        Ok(BookingCodeIssued {
            message: if email_sent {
                "A new verification code was sent to your email.".to_string()
            } else {
                "The verification email could not be sent, please try again.".to_string()
            },
            booking_id: booking.id,
            verification_deadline: deadline,
            email_sent,
            total_amount_cents: booking.total_amount_cents,
        })
    }

    /// Cancels the caller's booking while no payment is in flight or settled.
    pub async fn cancel_booking(
        &self,
        traveler_id: &Uuid,
        booking_id: &Uuid,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await?;
        let booking = Self::fetch_for_update(&mut tx, booking_id).await?;

        if booking.user_id != *traveler_id {
            return Err(BookingError::Forbidden);
        }
        if booking.is_paid
            || matches!(
                booking.payment_status,
                PaymentStatus::Paid | PaymentStatus::Processing | PaymentStatus::Refunded
            )
        {
            return Err(BookingError::PaymentInProgress(booking.payment_status.as_str()));
        }
        if !booking
            .booking_status
            .can_transition_to(BookingStatus::Cancelled)
        {
            return Err(BookingError::transition(
                booking.booking_status,
                BookingStatus::Cancelled,
            ));
        }

        cancel_in_tx(&mut tx, booking_id).await?;
        tx.commit().await?;

        log::info!("🚫 Booking {} cancelled by traveler", booking_id);
        self.get_booking(traveler_id, booking_id, false).await
    }

    /// Bookings made by the traveler, newest first.
    pub async fn my_bookings(&self, traveler_id: &Uuid) -> Result<Vec<Booking>, BookingError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS}, l.spot, l.location \
             FROM bookings b JOIN listings l ON l.id = b.listing_id \
             WHERE b.user_id = $1 ORDER BY b.created_at DESC"
        ))
        .bind(traveler_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    /// One booking, visible to its traveler, the listing owner or an admin.
    pub async fn get_booking(
        &self,
        caller_id: &Uuid,
        booking_id: &Uuid,
        caller_is_admin: bool,
    ) -> Result<Booking, BookingError> {
        let (booking, owner_id): (Booking, Uuid) = sqlx::query_as::<_, BookingWithOwner>(&format!(
            "SELECT {BOOKING_COLUMNS}, l.spot, l.location, l.owner_id \
             FROM bookings b JOIN listings l ON l.id = b.listing_id WHERE b.id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| (row.booking, row.owner_id))
        .ok_or(BookingError::NotFound)?;

        if caller_is_admin || booking.user_id == *caller_id || owner_id == *caller_id {
            Ok(booking)
        } else {
            Err(BookingError::Forbidden)
        }
    }

    /// Date ranges of a listing that are currently blocked.
    pub async fn booked_dates(&self, listing_id: &Uuid) -> Result<Vec<BookedRange>, BookingError> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM listings WHERE id = $1")
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(BookingError::ListingNotFound);
        }

        let ranges = sqlx::query_as::<_, BookedRange>(
            r#"
            SELECT check_in, check_out FROM bookings
            WHERE listing_id = $1
              AND check_out >= CURRENT_DATE
              AND (booking_status IN ('confirmed', 'completed')
                   OR (booking_status = 'pending' AND verification_deadline > NOW()))
            ORDER BY check_in
            "#,
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ranges)
    }

    /// See [`cancel_expired_bookings`].
    pub async fn cancel_expired_bookings(&self) -> Result<u64, BookingError> {
        cancel_expired_bookings(&self.pool).await
    }
}

async fn cancel_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: &Uuid,
) -> Result<(), BookingError> {
    sqlx::query(
        "UPDATE bookings SET booking_status = 'cancelled', verification_code = NULL, \
         updated_at = NOW() WHERE id = $1",
    )
    .bind(booking_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gender;
    use chrono::NaiveDate;

    fn pending(code: &str, attempts: i32, deadline_mins: i64) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            email: "sam@example.com".to_string(),
            name: "Sam".to_string(),
            city: "Denver".to_string(),
            postcode: "80202".to_string(),
            phone_number: "3035550100".to_string(),
            gender: Gender::Female,
            check_in: NaiveDate::from_ymd_opt(2030, 7, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2030, 7, 3).unwrap(),
            verification_code: Some(code.to_string()),
            verification_deadline: now + Duration::minutes(deadline_mins),
            verification_attempts: attempts,
            is_verified: false,
            is_paid: false,
            payment_status: PaymentStatus::Unpaid,
            booking_status: BookingStatus::Pending,
            total_amount_cents: 9000,
            currency: "usd".to_string(),
            platform_fee_cents: 0,
            owner_amount_cents: 0,
            payment_id: None,
            stripe_session_id: None,
            stripe_payment_intent_id: None,
            spot: None,
            location: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_matching_code_in_time_is_accepted() {
        let booking = pending("123456", 0, 10);
        assert_eq!(
            check_booking_code(&booking, " 123456 ", Utc::now()),
            CodeCheck::Accepted
        );
    }

    #[test]
    fn test_expired_code_wins_over_match() {
        let booking = pending("123456", 0, -1);
        assert_eq!(
            check_booking_code(&booking, "123456", Utc::now()),
            CodeCheck::Expired
        );
    }

    #[test]
    fn test_wrong_codes_count_up_then_exhaust() {
        let booking = pending("123456", 0, 10);
        assert_eq!(
            check_booking_code(&booking, "000000", Utc::now()),
            CodeCheck::Wrong { attempts: 1 }
        );

        let booking = pending("123456", MAX_BOOKING_CODE_ATTEMPTS - 1, 10);
        assert_eq!(
            check_booking_code(&booking, "000000", Utc::now()),
            CodeCheck::Wrong {
                attempts: MAX_BOOKING_CODE_ATTEMPTS
            }
        );

        let booking = pending("123456", MAX_BOOKING_CODE_ATTEMPTS, 10);
        assert_eq!(
            check_booking_code(&booking, "000000", Utc::now()),
            CodeCheck::Exhausted
        );
    }

    #[test]
    fn test_cleared_code_never_matches() {
        let mut booking = pending("123456", 0, 10);
        booking.verification_code = None;
        assert_eq!(
            check_booking_code(&booking, "123456", Utc::now()),
            CodeCheck::Wrong { attempts: 1 }
        );
    }
}
