use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9][0-9 ()\-]{5,18}[0-9]$").unwrap();
    static ref POSTCODE_RE: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 \-]{1,10}$").unwrap();
}

/// A status string that is not part of the enum.
#[derive(Debug, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

/// Lifecycle of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Awaiting email-code confirmation
    Pending,
    /// Confirmed by code, awaiting stay or payment
    Confirmed,
    /// Paid
    Completed,
    /// Cancelled by the traveler, by expiry or by a failed payment
    Cancelled,
}

impl BookingStatus {
    /// Database and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Whether `self → next` is an allowed transition.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }

    /// Completed and cancelled bookings never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(UnknownStatus(value)),
        }
    }
}

/// Payment state of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// No checkout started
    Unpaid,
    /// Checkout session open
    Processing,
    /// Charge succeeded
    Paid,
    /// Checkout expired or charge failed
    Failed,
    /// Charge refunded
    Refunded,
}

impl PaymentStatus {
    /// Database and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "processing" => Ok(PaymentStatus::Processing),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(UnknownStatus(value)),
        }
    }
}

/// Gender recorded with the booking contact details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    /// Male
    Male,
    /// Female
    Female,
    /// Other or undisclosed
    Other,
}

impl Gender {
    /// Database and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other" => Ok(Gender::Other),
            _ => Err(UnknownStatus(value)),
        }
    }
}

/// A reservation of one listing for a date range.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Booking {
    /// Booking id
    pub id: Uuid,
    /// Booked listing
    pub listing_id: Uuid,
    /// Traveler who made the booking
    pub user_id: Uuid,
    /// Contact email
    pub email: String,
    /// Contact name
    pub name: String,
    /// Contact city
    pub city: String,
    /// Contact postcode
    pub postcode: String,
    /// Contact phone
    pub phone_number: String,
    /// Contact gender
    #[sqlx(try_from = "String")]
    pub gender: Gender,
    /// First night
    pub check_in: NaiveDate,
    /// Departure day, exclusive
    pub check_out: NaiveDate,
    /// Outstanding confirmation code
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    /// When the confirmation code stops being accepted
    pub verification_deadline: DateTime<Utc>,
    /// Wrong codes submitted so far
    #[serde(skip_serializing)]
    pub verification_attempts: i32,
    /// Whether the code was confirmed
    pub is_verified: bool,
    /// Whether payment succeeded
    pub is_paid: bool,
    /// Payment state
    #[sqlx(try_from = "String")]
    pub payment_status: PaymentStatus,
    /// Reservation state
    #[sqlx(try_from = "String")]
    pub booking_status: BookingStatus,
    /// Nightly price × nights, in cents
    pub total_amount_cents: i64,
    /// ISO currency code
    pub currency: String,
    /// Platform share, in cents
    pub platform_fee_cents: i64,
    /// Owner share, in cents
    pub owner_amount_cents: i64,
    /// Payment identifier recorded at settlement
    pub payment_id: Option<String>,
    /// Checkout session id
    pub stripe_session_id: Option<String>,
    /// Payment intent id
    pub stripe_payment_intent_id: Option<String>,
    /// Listing spot name, present on list queries
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot: Option<String>,
    /// Listing location, present on list queries
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Column list matching [`Booking`] for queries aliasing `bookings` as `b`.
pub const BOOKING_COLUMNS: &str = "b.id, b.listing_id, b.user_id, b.email, b.name, b.city, \
     b.postcode, b.phone_number, b.gender, b.check_in, b.check_out, b.verification_code, \
     b.verification_deadline, b.verification_attempts, b.is_verified, b.is_paid, \
     b.payment_status, b.booking_status, b.total_amount_cents, b.currency, \
     b.platform_fee_cents, b.owner_amount_cents, b.payment_id, b.stripe_session_id, \
     b.stripe_payment_intent_id, b.created_at, b.updated_at";

/// Body of a create-booking request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    /// Contact email, receives the confirmation code
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    /// Contact name
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    /// Contact city
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    /// Contact postcode
    #[validate(regex(path = *POSTCODE_RE, message = "Please enter a valid postcode"))]
    pub postcode: String,
    /// Contact phone
    #[serde(alias = "phoneNumber")]
    #[validate(regex(path = *PHONE_RE, message = "Please enter a valid phone number"))]
    pub phone_number: String,
    /// Contact gender
    pub gender: Gender,
    /// First night, `YYYY-MM-DD`
    #[serde(alias = "checkIn")]
    pub check_in: NaiveDate,
    /// Departure day, `YYYY-MM-DD`
    #[serde(alias = "checkOut")]
    pub check_out: NaiveDate,
}

/// Body of a verify-booking request.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyBookingRequest {
    /// 6-digit code from the email
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}

/// Response to a booking creation or code resend.
#[derive(Debug, Serialize)]
pub struct BookingCodeIssued {
    /// What the traveler should do next
    pub message: String,
    /// Booking id
    pub booking_id: Uuid,
    /// When the code stops being accepted
    pub verification_deadline: DateTime<Utc>,
    /// Whether the code email was handed to the provider
    pub email_sent: bool,
    /// Snapshot of the price for the stay, in cents
    pub total_amount_cents: i64,
}

/// A blocked date range of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct BookedRange {
    /// First blocked night
    pub check_in: NaiveDate,
    /// First free day
    pub check_out: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(Completed.is_terminal() && Cancelled.is_terminal());
    }

    #[test]
    fn test_status_text_round_trip() {
        for status in ["pending", "confirmed", "completed", "cancelled"] {
            assert_eq!(
                BookingStatus::try_from(status.to_string()).unwrap().as_str(),
                status
            );
        }
        for status in ["unpaid", "processing", "paid", "failed", "refunded"] {
            assert_eq!(
                PaymentStatus::try_from(status.to_string()).unwrap().as_str(),
                status
            );
        }
        assert!(BookingStatus::try_from("archived".to_string()).is_err());
    }

    #[test]
    fn test_create_request_accepts_camel_case_aliases() {
        let request: CreateBookingRequest = serde_json::from_value(serde_json::json!({
            "email": "sam@example.com",
            "name": "Sam",
            "city": "Denver",
            "postcode": "80202",
            "phoneNumber": "+1 (303) 555-0100",
            "gender": "Other",
            "checkIn": "2030-07-01",
            "checkOut": "2030-07-04"
        }))
        .unwrap();

        assert!(request.validate().is_ok());
        assert_eq!(request.gender, Gender::Other);
        assert_eq!(
            request.check_out,
            NaiveDate::from_ymd_opt(2030, 7, 4).unwrap()
        );
    }

    #[test]
    fn test_create_request_rejects_bad_contact_details() {
        let request: CreateBookingRequest = serde_json::from_value(serde_json::json!({
            "email": "not-an-email",
            "name": "Sam",
            "city": "Denver",
            "postcode": "80202",
            "phone_number": "call me",
            "gender": "Male",
            "check_in": "2030-07-01",
            "check_out": "2030-07-04"
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("phone_number"));
    }

    #[test]
    fn test_unknown_gender_is_rejected() {
        let result: Result<Gender, _> = serde_json::from_value(serde_json::json!("Unknown"));
        assert!(result.is_err());
    }

    #[test]
    fn test_verification_code_is_never_serialized() {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            email: "sam@example.com".to_string(),
            name: "Sam".to_string(),
            city: "Denver".to_string(),
            postcode: "80202".to_string(),
            phone_number: "3035550100".to_string(),
            gender: Gender::Male,
            check_in: NaiveDate::from_ymd_opt(2030, 7, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2030, 7, 2).unwrap(),
            verification_code: Some("123456".to_string()),
            verification_deadline: now,
            verification_attempts: 0,
            is_verified: false,
            is_paid: false,
            payment_status: PaymentStatus::Unpaid,
            booking_status: BookingStatus::Pending,
            total_amount_cents: 4500,
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
        };

        let json = serde_json::to_value(&booking).unwrap();
        assert!(json.get("verification_code").is_none());
        assert_eq!(json["booking_status"], "pending");
        assert_eq!(json["gender"], "Male");
    }
}
