use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::stripe::CheckoutSession;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`)
/// against the raw request body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature(
            "no v1 signature".to_string(),
        ));
    }
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let matches = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });

    if matches {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature(
            "no signature matches the payload".to_string(),
        ))
    }
}

/// The payment intent carried by failure events.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntentRef {
    /// `pi_...` id
    pub id: String,
    /// Metadata copied from checkout
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntentRef {
    /// Booking id recorded in the intent metadata.
    pub fn booking_id(&self) -> Option<Uuid> {
        self.metadata
            .get("booking_id")
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// Webhook events acted upon.
#[derive(Debug, Clone)]
pub enum StripeEvent {
    /// `checkout.session.completed`
    CheckoutCompleted(CheckoutSession),
    /// `checkout.session.expired`
    CheckoutExpired(CheckoutSession),
    /// `payment_intent.payment_failed`
    PaymentFailed(PaymentIntentRef),
    /// Any other event type
    Ignored(String),
}

impl StripeEvent {
    /// Parses a webhook body.
    pub fn parse(payload: &[u8]) -> Result<Self, PaymentError> {
        let event: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

        let object = event.data.object;
        let parsed = match event.kind.as_str() {
            "checkout.session.completed" => StripeEvent::CheckoutCompleted(session(object)?),
            "checkout.session.expired" => StripeEvent::CheckoutExpired(session(object)?),
            "payment_intent.payment_failed" => StripeEvent::PaymentFailed(
                serde_json::from_value(object)
                    .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?,
            ),
            _ => StripeEvent::Ignored(event.kind),
        };

        Ok(parsed)
    }
}

fn session(object: serde_json::Value) -> Result<CheckoutSession, PaymentError> {
    serde_json::from_value(object).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        )
    }

    #[test]
    fn test_valid_signature_is_accepted() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, 1_700_000_000);

        assert!(verify_signature(payload, &header, SECRET, 1_700_000_100, 300).is_ok());
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let header = sign(b"original", 1_700_000_000);

        let result = verify_signature(b"tampered", &header, SECRET, 1_700_000_000, 300);
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let payload = b"{}";
        let header = sign(payload, 1_700_000_000);

        let result = verify_signature(payload, &header, SECRET, 1_700_000_301, 300);
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_extreme_timestamp_is_rejected() {
        let now = 1_700_000_000;
        for header in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
            assert!(matches!(
                verify_signature(b"{}", header, SECRET, now, SIGNATURE_TOLERANCE_SECS),
                Err(PaymentError::InvalidSignature(_))
            ));
        }
    }

    #[test]
    fn test_any_of_several_signatures_may_match() {
        let payload = b"{}";
        let header = format!("{},v1=deadbeef", sign(payload, 42)).replacen(
            "v1=",
            "v1=00,v1=",
            1,
        );

        assert!(verify_signature(payload, &header, SECRET, 42, 300).is_ok());
    }

    #[test]
    fn test_malformed_header_is_rejected() {
        assert!(verify_signature(b"{}", "garbage", SECRET, 0, 300).is_err());
        assert!(verify_signature(b"{}", "t=5", SECRET, 5, 300).is_err());
    }

    #[test]
    fn test_parse_events() {
        let completed = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "payment_intent": "pi_1",
                "metadata": {}
            }}
        });
        match StripeEvent::parse(completed.to_string().as_bytes()).unwrap() {
            StripeEvent::CheckoutCompleted(session) => {
                assert_eq!(session.payment_intent.as_deref(), Some("pi_1"))
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let failed = serde_json::json!({
            "type": "payment_intent.payment_failed",
            "data": { "object": { "id": "pi_2", "metadata": { "booking_id": Uuid::nil() } } }
        });
        match StripeEvent::parse(failed.to_string().as_bytes()).unwrap() {
            StripeEvent::PaymentFailed(intent) => assert_eq!(intent.booking_id(), Some(Uuid::nil())),
            other => panic!("unexpected event: {:?}", other),
        }

        let other = serde_json::json!({ "type": "charge.refunded", "data": { "object": {} } });
        assert!(matches!(
            StripeEvent::parse(other.to_string().as_bytes()).unwrap(),
            StripeEvent::Ignored(kind) if kind == "charge.refunded"
        ));
    }
}
