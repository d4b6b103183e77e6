use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::types::is_checkout_session_id;

const STRIPE_API_BASE: &str = "https://api.stripe.com";
const STRIPE_API_VERSION: &str = "2024-06-20";

/// A connected (payout) account.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectedAccount {
    /// `acct_...` id
    pub id: String,
    /// Capability name → state (`active`, `pending`, `inactive`)
    #[serde(default)]
    pub capabilities: HashMap<String, String>,
}

impl ConnectedAccount {
    /// Whether the account can receive destination-charge transfers.
    pub fn transfers_active(&self) -> bool {
        self.capabilities
            .get("transfers")
            .is_some_and(|state| state == "active")
    }
}

/// A hosted checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// `cs_...` id
    pub id: String,
    /// Hosted page URL, present while the session is open
    pub url: Option<String>,
    /// `open`, `complete` or `expired`
    pub status: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`
    pub payment_status: String,
    /// Payment intent id once one exists
    pub payment_intent: Option<String>,
    /// Total charged, in cents
    pub amount_total: Option<i64>,
    /// Charged currency
    pub currency: Option<String>,
    /// Metadata attached at creation
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Whether the charge succeeded.
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    /// Booking id recorded in the session metadata.
    pub fn booking_id(&self) -> Option<Uuid> {
        self.metadata
            .get("booking_id")
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

/// What to charge for one booking.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Booking being paid
    pub booking_id: Uuid,
    /// Paying traveler
    pub user_id: Uuid,
    /// Booked listing
    pub listing_id: Uuid,
    /// Line item name
    pub product_name: String,
    /// Amount charged, in cents
    pub amount_cents: i64,
    /// ISO currency code
    pub currency: String,
    /// Platform share kept from the charge, in cents
    pub application_fee_cents: i64,
    /// Owner's connected account receiving the rest
    pub destination_account: String,
    /// Prefilled payer email
    pub customer_email: Option<String>,
    /// Redirect after payment
    pub success_url: String,
    /// Redirect after abandoning
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Form fields of a destination-charge checkout session.
    pub fn form_params(&self) -> Vec<(String, String)> {
        let booking_id = self.booking_id.to_string();
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                self.currency.clone(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                self.product_name.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                self.amount_cents.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("metadata[booking_id]".to_string(), booking_id.clone()),
            ("metadata[user_id]".to_string(), self.user_id.to_string()),
            (
                "metadata[listing_id]".to_string(),
                self.listing_id.to_string(),
            ),
            (
                "payment_intent_data[application_fee_amount]".to_string(),
                self.application_fee_cents.to_string(),
            ),
            (
                "payment_intent_data[transfer_data][destination]".to_string(),
                self.destination_account.clone(),
            ),
            (
                "payment_intent_data[metadata][booking_id]".to_string(),
                booking_id,
            ),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        if let Some(email) = &self.customer_email {
            params.push(("customer_email".to_string(), email.clone()));
        }

        params
    }
}

/// The payment provider operations checkout depends on.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Loads a connected account.
    async fn retrieve_account(&self, account_id: &str) -> Result<ConnectedAccount, PaymentError>;

    /// Opens a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Loads a checkout session.
    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError>;
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Stripe REST API client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    /// Client for the live Stripe API.
    pub fn new(secret_key: impl Into<String>) -> Result<Self, PaymentError> {
        Self::with_base_url(secret_key, STRIPE_API_BASE)
    }

    /// Client for another API host (a local mock in tests).
    pub fn with_base_url(
        secret_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Gateway(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        not_found: PaymentError,
    ) -> Result<T, PaymentError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(not_found);
        }
        if !status.is_success() {
            let detail = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(PaymentError::Gateway(detail));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PaymentError::Gateway(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn retrieve_account(&self, account_id: &str) -> Result<ConnectedAccount, PaymentError> {
        debug!("Retrieving connected account {}", account_id);
        let request = self.client.get(self.url(&format!("accounts/{}", account_id)));
        self.execute(request, PaymentError::OwnerNotConnected).await
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        debug!("Creating checkout session for booking {}", request.booking_id);
        let builder = self
            .client
            .post(self.url("checkout/sessions"))
            .form(&request.form_params());
        self.execute(
            builder,
            PaymentError::Gateway("checkout endpoint not found".to_string()),
        )
        .await
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError> {
        if !is_checkout_session_id(session_id) {
            return Err(PaymentError::InvalidSessionId);
        }
        debug!("Retrieving checkout session {}", session_id);
        let request = self
            .client
            .get(self.url(&format!("checkout/sessions/{}", session_id)));
        self.execute(request, PaymentError::SessionNotFound).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn checkout_request() -> CheckoutRequest {
        CheckoutRequest {
            booking_id: Uuid::nil(),
            user_id: Uuid::nil(),
            listing_id: Uuid::nil(),
            product_name: "Booking for Lakeside Pad".to_string(),
            amount_cents: 13_500,
            currency: "usd".to_string(),
            application_fee_cents: 405,
            destination_account: "acct_123".to_string(),
            customer_email: Some("sam@example.com".to_string()),
            success_url: "http://localhost:8080/api/payments/success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "http://localhost:3000/payment-cancelled".to_string(),
        }
    }

    #[test]
    fn test_form_params_describe_destination_charge() {
        let params: HashMap<String, String> = checkout_request().form_params().into_iter().collect();

        assert_eq!(params["mode"], "payment");
        assert_eq!(params["line_items[0][price_data][unit_amount]"], "13500");
        assert_eq!(params["payment_intent_data[application_fee_amount]"], "405");
        assert_eq!(
            params["payment_intent_data[transfer_data][destination]"],
            "acct_123"
        );
        assert_eq!(params["metadata[booking_id]"], Uuid::nil().to_string());
        assert_eq!(params["customer_email"], "sam@example.com");
    }

    #[test]
    fn test_session_booking_id_from_metadata() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "payment_status": "paid",
            "metadata": { "booking_id": "6f1c1c4e-2d6e-4a8e-9a57-1f6f0d3e2b10" }
        }))
        .unwrap();

        assert!(session.is_paid());
        assert_eq!(
            session.booking_id().unwrap().to_string(),
            "6f1c1c4e-2d6e-4a8e-9a57-1f6f0d3e2b10"
        );
    }

    #[tokio::test]
    async fn test_retrieve_account_reads_transfer_capability() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/accounts/acct_123")
                .header("Authorization", "Bearer sk_test_abc");
            then.status(200).json_body(serde_json::json!({
                "id": "acct_123",
                "capabilities": { "transfers": "active", "card_payments": "pending" }
            }));
        });

        let client = StripeClient::with_base_url("sk_test_abc", server.base_url()).unwrap();
        let account = client.retrieve_account("acct_123").await.unwrap();

        mock.assert();
        assert!(account.transfers_active());
    }

    #[tokio::test]
    async fn test_create_checkout_session_posts_form() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/checkout/sessions")
                .header("Stripe-Version", "2024-06-20")
                .body_contains("mode=payment");
            then.status(200).json_body(serde_json::json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1",
                "status": "open",
                "payment_status": "unpaid"
            }));
        });

        let client = StripeClient::with_base_url("sk_test_abc", server.base_url()).unwrap();
        let session = client
            .create_checkout_session(&checkout_request())
            .await
            .unwrap();

        mock.assert();
        assert_eq!(session.id, "cs_test_1");
        assert!(!session.is_paid());
    }

    #[tokio::test]
    async fn test_missing_session_maps_to_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/checkout/sessions/cs_missing");
            then.status(404).json_body(serde_json::json!({
                "error": { "message": "No such checkout.session" }
            }));
        });

        let client = StripeClient::with_base_url("sk_test_abc", server.base_url()).unwrap();
        let result = client.retrieve_session("cs_missing").await;

        assert!(matches!(result, Err(PaymentError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_malformed_session_id_never_reaches_provider() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET);
            then.status(200).json_body(serde_json::json!({ "id": "acct_1" }));
        });

        let client = StripeClient::with_base_url("sk_test_abc", server.base_url()).unwrap();
        for session_id in ["../../accounts/acct_1", "cs_1/../../balance", "cs_1?expand[]=x", ""] {
            let result = client.retrieve_session(session_id).await;
            assert!(matches!(result, Err(PaymentError::InvalidSessionId)));
        }

        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_provider_error_message_is_kept() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/accounts/acct_bad");
            then.status(400).json_body(serde_json::json!({
                "error": { "message": "Invalid account" }
            }));
        });

        let client = StripeClient::with_base_url("sk_test_abc", server.base_url()).unwrap();
        match client.retrieve_account("acct_bad").await {
            Err(PaymentError::Gateway(message)) => assert_eq!(message, "Invalid account"),
            other => panic!("unexpected result: {:?}", other.map(|a| a.id)),
        }
    }
}
