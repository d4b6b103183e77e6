//! Date-range arithmetic and conflict detection for reservations.
//!
//! Ranges are half-open: a stay `[check_in, check_out)` occupies the nights
//! from `check_in` up to but not including `check_out`, so a departure and
//! an arrival on the same day do not collide.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::BookingError;
use crate::types::BookingStatus;

/// A validated half-open stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl DateRange {
    /// Builds a range, rejecting empty or inverted ones.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, BookingError> {
        if check_out <= check_in {
            return Err(BookingError::InvalidDates(
                "Check-out must be after check-in".to_string(),
            ));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// First night.
    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    /// Departure day.
    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Number of nights.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Price of the stay at `price_cents` per night.
    pub fn total_cents(&self, price_cents: i64) -> Result<i64, BookingError> {
        price_cents.checked_mul(self.nights()).ok_or_else(|| {
            BookingError::InvalidDates("Stay is too long for this listing's price".to_string())
        })
    }

    /// Whether two stays share at least one night.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

/// An existing reservation considered when placing a new one.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExistingStay {
    /// Booking id
    pub id: Uuid,
    /// First night
    pub check_in: NaiveDate,
    /// Departure day
    pub check_out: NaiveDate,
    /// Reservation state
    #[sqlx(try_from = "String")]
    pub booking_status: BookingStatus,
    /// Deadline of the confirmation code
    pub verification_deadline: DateTime<Utc>,
}

impl ExistingStay {
    /// Confirmed and completed bookings always block. Pending ones block
    /// until their confirmation deadline passes.
    pub fn is_blocking(&self, now: DateTime<Utc>) -> bool {
        match self.booking_status {
            BookingStatus::Confirmed | BookingStatus::Completed => true,
            BookingStatus::Pending => self.verification_deadline > now,
            BookingStatus::Cancelled => false,
        }
    }
}

/// First blocking stay overlapping `range`, ignoring `exclude`.
pub fn find_conflict<'a>(
    range: &DateRange,
    existing: &'a [ExistingStay],
    exclude: Option<Uuid>,
    now: DateTime<Utc>,
) -> Option<&'a ExistingStay> {
    existing.iter().find(|stay| {
        Some(stay.id) != exclude
            && stay.is_blocking(now)
            && stay.check_out > stay.check_in
            && range.overlaps(&DateRange {
                check_in: stay.check_in,
                check_out: stay.check_out,
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 7, day).unwrap()
    }

    fn stay(check_in: u32, check_out: u32, status: BookingStatus, deadline_mins: i64) -> ExistingStay {
        ExistingStay {
            id: Uuid::new_v4(),
            check_in: d(check_in),
            check_out: d(check_out),
            booking_status: status,
            verification_deadline: Utc::now() + Duration::minutes(deadline_mins),
        }
    }

    #[test]
    fn test_total_cents() {
        let range = DateRange::new(d(1), d(4)).unwrap();
        assert_eq!(range.total_cents(4_550).unwrap(), 13_650);

        let long = DateRange::new(NaiveDate::MIN, NaiveDate::MAX).unwrap();
        assert!(matches!(
            long.total_cents(i64::MAX / 2),
            Err(BookingError::InvalidDates(_))
        ));
    }

    #[test]
    fn test_range_must_be_non_empty() {
        assert!(DateRange::new(d(5), d(5)).is_err());
        assert!(DateRange::new(d(6), d(5)).is_err());
        assert_eq!(DateRange::new(d(1), d(4)).unwrap().nights(), 3);
    }

    #[test]
    fn test_back_to_back_stays_do_not_overlap() {
        let a = DateRange::new(d(1), d(4)).unwrap();
        let b = DateRange::new(d(4), d(6)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));

        let c = DateRange::new(d(3), d(5)).unwrap();
        assert!(a.overlaps(&c));
        let inner = DateRange::new(d(2), d(3)).unwrap();
        assert!(a.overlaps(&inner) && inner.overlaps(&a));
    }

    #[test]
    fn test_confirmed_booking_blocks() {
        let existing = vec![stay(3, 6, BookingStatus::Confirmed, -60)];
        let wanted = DateRange::new(d(5), d(8)).unwrap();
        assert!(find_conflict(&wanted, &existing, None, Utc::now()).is_some());
    }

    #[test]
    fn test_expired_pending_booking_does_not_block() {
        let existing = vec![stay(3, 6, BookingStatus::Pending, -1)];
        let wanted = DateRange::new(d(3), d(6)).unwrap();
        assert!(find_conflict(&wanted, &existing, None, Utc::now()).is_none());

        let live = vec![stay(3, 6, BookingStatus::Pending, 5)];
        assert!(find_conflict(&wanted, &live, None, Utc::now()).is_some());
    }

    #[test]
    fn test_cancelled_booking_does_not_block() {
        let existing = vec![stay(1, 10, BookingStatus::Cancelled, 5)];
        let wanted = DateRange::new(d(2), d(3)).unwrap();
        assert!(find_conflict(&wanted, &existing, None, Utc::now()).is_none());
    }

    #[test]
    fn test_excluded_booking_is_ignored() {
        let existing = vec![stay(1, 5, BookingStatus::Pending, 5)];
        let wanted = DateRange::new(d(1), d(5)).unwrap();
        let own = existing[0].id;
        assert!(find_conflict(&wanted, &existing, Some(own), Utc::now()).is_none());
    }
}
