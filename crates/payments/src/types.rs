use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A ledger status string that is not part of the enum.
#[derive(Debug, thiserror::Error)]
#[error("unknown transaction status '{0}'")]
pub struct UnknownTransactionStatus(pub String);

/// State of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Charge captured
    Completed,
    /// Awaiting capture
    Pending,
    /// Charge failed
    Failed,
    /// Charge returned to the payer
    Refunded,
}

impl TransactionStatus {
    /// Database and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = UnknownTransactionStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "completed" => Ok(TransactionStatus::Completed),
            "pending" => Ok(TransactionStatus::Pending),
            "failed" => Ok(TransactionStatus::Failed),
            "refunded" => Ok(TransactionStatus::Refunded),
            _ => Err(UnknownTransactionStatus(value)),
        }
    }
}

/// One ledger entry: a traveler paying a landowner for a booking.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Transaction {
    /// Entry id
    pub id: Uuid,
    /// Paid booking, if it still exists
    pub booking_id: Option<Uuid>,
    /// Payer, unset once the account is deleted
    pub pay_user_id: Option<Uuid>,
    /// Payer role
    pub pay_user_role: String,
    /// Receiver, unset once the account is deleted
    pub receive_user_id: Option<Uuid>,
    /// Receiver role
    pub receive_user_role: String,
    /// Gross amount, in cents
    pub amount_cents: i64,
    /// Platform share, in cents
    pub platform_fee_cents: i64,
    /// Receiver share, in cents
    pub owner_amount_cents: i64,
    /// ISO currency code
    pub currency: String,
    /// Always `stripe` for checkout payments
    pub payment_method: String,
    /// Provider id of the charge, unique
    pub transaction_id: String,
    /// Checkout session id
    pub stripe_session_id: Option<String>,
    /// Entry state
    #[sqlx(try_from = "String")]
    pub payment_status: TransactionStatus,
    /// Payer name, present on list queries
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_user_name: Option<String>,
    /// Receiver name, present on list queries
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_user_name: Option<String>,
    /// Booked spot, present on list queries
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Column list matching [`Transaction`] for queries aliasing `transactions`
/// as `t`, payer as `pu`, receiver as `ru` and listing as `l`.
pub const TRANSACTION_LIST_COLUMNS: &str = "t.id, t.booking_id, t.pay_user_id, t.pay_user_role, \
     t.receive_user_id, t.receive_user_role, t.amount_cents, t.platform_fee_cents, \
     t.owner_amount_cents, t.currency, t.payment_method, t.transaction_id, \
     t.stripe_session_id, t.payment_status, t.created_at, \
     pu.name AS pay_user_name, ru.name AS receive_user_name, l.spot";

/// `FROM` clause joining the names shown with [`TRANSACTION_LIST_COLUMNS`].
pub const TRANSACTION_LIST_FROM: &str = "transactions t \
     LEFT JOIN users pu ON pu.id = t.pay_user_id \
     LEFT JOIN users ru ON ru.id = t.receive_user_id \
     LEFT JOIN bookings b ON b.id = t.booking_id \
     LEFT JOIN listings l ON l.id = b.listing_id";

/// Body of a connect-account request.
#[derive(Debug, Deserialize)]
pub struct ConnectAccountRequest {
    /// `acct_...` id of the landowner's connected account
    #[serde(alias = "stripeAccountId")]
    pub account_id: String,
}

/// A freshly opened checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Hosted payment page
    pub url: String,
    /// Checkout session id
    pub session_id: String,
}

/// Provider-side state of a checkout session.
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    /// `open`, `complete` or `expired`
    pub status: Option<String>,
    /// `paid` or `unpaid`
    pub payment_status: String,
}

/// Result of settling a paid checkout.
#[derive(Debug, Serialize)]
pub struct PaymentSettled {
    /// Always true when returned
    pub success: bool,
    /// Settled booking
    pub booking_id: Uuid,
    /// False when the booking had already been settled
    pub newly_paid: bool,
}

/// Whether `account_id` looks like a connected account id.
pub fn is_connected_account_id(account_id: &str) -> bool {
    account_id
        .strip_prefix("acct_")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Checkout session ids look like `cs_` followed by letters, digits or `_`.
pub fn is_checkout_session_id(session_id: &str) -> bool {
    session_id.strip_prefix("cs_").is_some_and(|rest| {
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_account_id_format() {
        assert!(is_connected_account_id("acct_1NabcXYZ"));
        assert!(!is_connected_account_id("acct_"));
        assert!(!is_connected_account_id("cus_123"));
        assert!(!is_connected_account_id("acct_12 3"));
    }

    #[test]
    fn test_entry_of_deleted_payer_still_serializes() {
        let transaction = Transaction {
            id: Uuid::nil(),
            booking_id: None,
            pay_user_id: None,
            pay_user_role: "traveler".to_string(),
            receive_user_id: Some(Uuid::nil()),
            receive_user_role: "landowner".to_string(),
            amount_cents: 10_000,
            platform_fee_cents: 300,
            owner_amount_cents: 9_700,
            currency: "usd".to_string(),
            payment_method: "stripe".to_string(),
            transaction_id: "pi_123".to_string(),
            stripe_session_id: Some("cs_test_1".to_string()),
            payment_status: TransactionStatus::Completed,
            pay_user_name: None,
            receive_user_name: Some("Dana".to_string()),
            spot: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&transaction).unwrap();
        assert!(json["pay_user_id"].is_null());
        assert_eq!(json["owner_amount_cents"], 9_700);
        assert!(json.get("pay_user_name").is_none());
    }

    #[test]
    fn test_checkout_session_id_format() {
        assert!(is_checkout_session_id("cs_test_a1B2c3"));
        assert!(!is_checkout_session_id("cs_"));
        assert!(!is_checkout_session_id("acct_123"));
        assert!(!is_checkout_session_id("cs_../../accounts/acct_1"));
        assert!(!is_checkout_session_id("cs_1?expand[]=payment_intent"));
    }

    #[test]
    fn test_connect_request_accepts_camel_case() {
        let request: ConnectAccountRequest =
            serde_json::from_value(serde_json::json!({ "stripeAccountId": "acct_9" })).unwrap();
        assert_eq!(request.account_id, "acct_9");
    }

    #[test]
    fn test_transaction_status_text() {
        assert_eq!(
            TransactionStatus::try_from("refunded".to_string()).unwrap(),
            TransactionStatus::Refunded
        );
        assert!(TransactionStatus::try_from("void".to_string()).is_err());
    }
}
