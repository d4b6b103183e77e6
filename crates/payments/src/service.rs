use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use auth_services::types::Role;
use bookings::{BOOKING_COLUMNS, Booking, BookingStatus, PaymentStatus};

use crate::config::PaymentConfig;
use crate::error::PaymentError;
use crate::fees::{PaymentSplit, split_amount};
use crate::stripe::{CheckoutRequest, CheckoutSession, PaymentGateway};
use crate::types::{
    CheckoutResponse, PaymentSettled, SessionStatus, TRANSACTION_LIST_COLUMNS,
    TRANSACTION_LIST_FROM, Transaction, is_checkout_session_id, is_connected_account_id,
};
use crate::webhook::{SIGNATURE_TOLERANCE_SECS, StripeEvent, verify_signature};

#[derive(sqlx::FromRow)]
struct PayableBooking {
    #[sqlx(flatten)]
    booking: Booking,
    owner_id: Uuid,
    owner_account: Option<String>,
}

/// Checkout, settlement and the transaction ledger.
pub struct PaymentService {
    pool: PgPool,
    config: PaymentConfig,
    gateway: Arc<dyn PaymentGateway>,
}

/// Whether a booking in this state may open a checkout.
pub fn ensure_payable(booking: &Booking) -> Result<(), PaymentError> {
    if booking.is_paid || booking.payment_status == PaymentStatus::Paid {
        return Err(PaymentError::AlreadyPaid);
    }
    if !booking.is_verified || booking.booking_status != BookingStatus::Confirmed {
        return Err(PaymentError::NotPayable(format!(
            "booking is {}",
            booking.booking_status.as_str()
        )));
    }
    match booking.payment_status {
        PaymentStatus::Unpaid | PaymentStatus::Processing => Ok(()),
        other => Err(PaymentError::NotPayable(format!("payment is {}", other.as_str()))),
    }
}

impl PaymentService {
    /// Creates a new instance.
    pub fn new(pool: PgPool, config: PaymentConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            pool,
            config,
            gateway,
        }
    }

    /// Records the landowner's connected account.
    pub async fn set_connect_account(
        &self,
        user_id: &Uuid,
        role: Role,
        account_id: &str,
    ) -> Result<(), PaymentError> {
        if role != Role::Landowner {
            return Err(PaymentError::Forbidden(
                "Only landowners can connect a payout account".to_string(),
            ));
        }

        let account_id = account_id.trim();
        if !is_connected_account_id(account_id) {
            return Err(PaymentError::InvalidAccountId);
        }

        sqlx::query("UPDATE users SET stripe_account_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        info!("Landowner {} connected account {}", user_id, account_id);
        Ok(())
    }

    async fn load_payable(&self, booking_id: &Uuid) -> Result<PayableBooking, PaymentError> {
        sqlx::query_as::<_, PayableBooking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}, l.spot, l.location,
                   l.owner_id, u.stripe_account_id AS owner_account
            FROM bookings b
            JOIN listings l ON l.id = b.listing_id
            JOIN users u ON u.id = l.owner_id
            WHERE b.id = $1
            "#
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PaymentError::BookingNotFound)
    }

    /// Opens a hosted checkout for a confirmed booking of the traveler.
    pub async fn create_checkout_session(
        &self,
        traveler_id: &Uuid,
        booking_id: &Uuid,
    ) -> Result<CheckoutResponse, PaymentError> {
        let payable = self.load_payable(booking_id).await?;
        let booking = &payable.booking;

        if booking.user_id != *traveler_id {
            return Err(PaymentError::BookingNotFound);
        }
        ensure_payable(booking)?;

        let destination = payable
            .owner_account
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(PaymentError::OwnerNotConnected)?;
        let account = self.gateway.retrieve_account(destination).await?;
        if !account.transfers_active() {
            return Err(PaymentError::OwnerTransfersInactive);
        }

        let split = split_amount(booking.total_amount_cents, self.config.service_fee_percent);
        let spot = booking.spot.clone().unwrap_or_else(|| "RV spot".to_string());
        let request = CheckoutRequest {
            booking_id: booking.id,
            user_id: booking.user_id,
            listing_id: booking.listing_id,
            product_name: format!("Booking for {}", spot),
            amount_cents: split.amount_cents,
            currency: self.config.currency.clone(),
            application_fee_cents: split.platform_fee_cents,
            destination_account: account.id.clone(),
            customer_email: Some(booking.email.clone()),
            success_url: self.config.success_url(),
            cancel_url: self.config.cancel_url(),
        };

        let session = self.gateway.create_checkout_session(&request).await?;
        let url = session
            .url
            .clone()
            .ok_or_else(|| PaymentError::Gateway("checkout session has no URL".to_string()))?;

        let updated = sqlx::query(
            r#"
            UPDATE bookings
            SET platform_fee_cents = $2, owner_amount_cents = $3, currency = $4,
                stripe_session_id = $5, payment_status = 'processing', updated_at = NOW()
            WHERE id = $1 AND NOT is_paid AND payment_status IN ('unpaid', 'processing')
            "#,
        )
        .bind(booking.id)
        .bind(split.platform_fee_cents)
        .bind(split.owner_amount_cents)
        .bind(&self.config.currency)
        .bind(&session.id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(PaymentError::AlreadyPaid);
        }

        info!(
            "Opened checkout {} for booking {} (fee {} of {} cents)",
            session.id, booking.id, split.platform_fee_cents, split.amount_cents
        );

        Ok(CheckoutResponse {
            url,
            session_id: session.id,
        })
    }

    /// Settles a checkout after the success redirect.
    pub async fn payment_success(&self, session_id: &str) -> Result<PaymentSettled, PaymentError> {
        if !is_checkout_session_id(session_id) {
            return Err(PaymentError::InvalidSessionId);
        }
        let session = self.gateway.retrieve_session(session_id).await?;
        if !session.is_paid() {
            return Err(PaymentError::PaymentNotCompleted);
        }
        self.settle(&session).await
    }

    async fn lock_booking_for_session(
        tx: &mut DbTransaction<'_, Postgres>,
        session: &CheckoutSession,
    ) -> Result<PayableBooking, PaymentError> {
        let row = sqlx::query_as::<_, PayableBooking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}, l.owner_id, NULL::TEXT AS owner_account
            FROM bookings b
            JOIN listings l ON l.id = b.listing_id
            WHERE b.id = $1 OR b.stripe_session_id = $2
            ORDER BY (b.id = $1) DESC
            LIMIT 1
            FOR UPDATE OF b
            "#
        ))
        .bind(session.booking_id().unwrap_or_else(Uuid::nil))
        .bind(&session.id)
        .fetch_optional(&mut **tx)
        .await?;

        row.ok_or(PaymentError::BookingNotFound)
    }

    /// Marks the booking of a paid session as paid and records the ledger
    /// entry. Settling twice is a no-op.
    pub async fn settle(&self, session: &CheckoutSession) -> Result<PaymentSettled, PaymentError> {
        let mut tx = self.pool.begin().await?;
        let payable = Self::lock_booking_for_session(&mut tx, session).await?;
        let booking = payable.booking;

        if booking.is_paid {
            tx.commit().await?;
            return Ok(PaymentSettled {
                success: true,
                booking_id: booking.id,
                newly_paid: false,
            });
        }

        let next_status = if booking
            .booking_status
            .can_transition_to(BookingStatus::Completed)
        {
            BookingStatus::Completed
        } else {
            warn!(
                "Booking {} was paid while {}, keeping its status",
                booking.id,
                booking.booking_status.as_str()
            );
            booking.booking_status
        };

        let payment_id = session
            .payment_intent
            .clone()
            .unwrap_or_else(|| session.id.clone());

        // Recompute the split when the stored one does not match the charge.
        let amount = session.amount_total.unwrap_or(booking.total_amount_cents);
        let split = if booking.platform_fee_cents + booking.owner_amount_cents == amount {
            PaymentSplit {
                amount_cents: amount,
                platform_fee_cents: booking.platform_fee_cents,
                owner_amount_cents: booking.owner_amount_cents,
            }
        } else {
            split_amount(amount, self.config.service_fee_percent)
        };
        let currency = session
            .currency
            .clone()
            .unwrap_or_else(|| booking.currency.clone());

        sqlx::query(
            r#"
            UPDATE bookings
            SET is_paid = TRUE, payment_status = 'paid', booking_status = $2,
                payment_id = $3, stripe_payment_intent_id = $4, stripe_session_id = $5,
                platform_fee_cents = $6, owner_amount_cents = $7, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(next_status.as_str())
        .bind(&payment_id)
        .bind(&session.payment_intent)
        .bind(&session.id)
        .bind(split.platform_fee_cents)
        .bind(split.owner_amount_cents)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO transactions (
                booking_id, pay_user_id, pay_user_role, receive_user_id, receive_user_role,
                amount_cents, platform_fee_cents, owner_amount_cents, currency,
                payment_method, transaction_id, stripe_session_id, payment_status
            )
            VALUES ($1, $2, 'traveler', $3, 'landowner', $4, $5, $6, $7, 'stripe', $8, $9, 'completed')
            ON CONFLICT (transaction_id) DO NOTHING
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(payable.owner_id)
        .bind(split.amount_cents)
        .bind(split.platform_fee_cents)
        .bind(split.owner_amount_cents)
        .bind(&currency)
        .bind(&payment_id)
        .bind(&session.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("💰 Booking {} paid via {}", booking.id, payment_id);

        Ok(PaymentSettled {
            success: true,
            booking_id: booking.id,
            newly_paid: true,
        })
    }

    /// Verifies and applies a webhook delivery.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<(), PaymentError> {
        match &self.config.webhook_secret {
            Some(secret) => {
                let header = signature.ok_or_else(|| {
                    PaymentError::InvalidSignature("missing Stripe-Signature header".to_string())
                })?;
                verify_signature(
                    payload,
                    header,
                    secret,
                    Utc::now().timestamp(),
                    SIGNATURE_TOLERANCE_SECS,
                )?;
            }
            None => warn!("⚠️ Accepting unsigned webhook, no signing secret configured"),
        }

        match StripeEvent::parse(payload)? {
            StripeEvent::CheckoutCompleted(session) => {
                if session.is_paid() {
                    self.settle(&session).await?;
                } else {
                    info!("Checkout {} completed but not paid yet", session.id);
                }
            }
            StripeEvent::CheckoutExpired(session) => {
                let cancelled = self.fail_unpaid("stripe_session_id = $1", &session.id).await?;
                info!("Checkout {} expired, {} booking(s) cancelled", session.id, cancelled);
            }
            StripeEvent::PaymentFailed(intent) => {
                let cancelled = match intent.booking_id() {
                    Some(booking_id) => {
                        self.fail_unpaid("id = $1::UUID", &booking_id.to_string())
                            .await?
                    }
                    None => {
                        self.fail_unpaid("stripe_payment_intent_id = $1", &intent.id)
                            .await?
                    }
                };
                info!("Payment {} failed, {} booking(s) cancelled", intent.id, cancelled);
            }
            StripeEvent::Ignored(kind) => info!("Ignoring webhook event {}", kind),
        }

        Ok(())
    }

    async fn fail_unpaid(&self, condition: &str, key: &str) -> Result<u64, PaymentError> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE bookings
            SET payment_status = 'failed', booking_status = 'cancelled', updated_at = NOW()
            WHERE {condition} AND NOT is_paid AND booking_status IN ('pending', 'confirmed')
            "#
        ))
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Provider-side state of a checkout session opened by `user_id`.
    pub async fn session_status(
        &self,
        user_id: &Uuid,
        session_id: &str,
    ) -> Result<SessionStatus, PaymentError> {
        if !is_checkout_session_id(session_id) {
            return Err(PaymentError::InvalidSessionId);
        }

        let owns_session: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE stripe_session_id = $1 AND user_id = $2)",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        if !owns_session {
            return Err(PaymentError::SessionNotFound);
        }

        let session = self.gateway.retrieve_session(session_id).await?;
        Ok(SessionStatus {
            status: session.status,
            payment_status: session.payment_status,
        })
    }

    /// Ledger entries the user paid or received, newest first.
    pub async fn my_transactions(&self, user_id: &Uuid) -> Result<Vec<Transaction>, PaymentError> {
        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_LIST_COLUMNS} FROM {TRANSACTION_LIST_FROM} \
             WHERE t.pay_user_id = $1 OR t.receive_user_id = $1 \
             ORDER BY t.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookings::Gender;
    use chrono::NaiveDate;

    fn booking(status: BookingStatus, payment: PaymentStatus, verified: bool) -> Booking {
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
            gender: Gender::Other,
            check_in: NaiveDate::from_ymd_opt(2030, 7, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2030, 7, 3).unwrap(),
            verification_code: None,
            verification_deadline: now,
            verification_attempts: 0,
            is_verified: verified,
            is_paid: payment == PaymentStatus::Paid,
            payment_status: payment,
            booking_status: status,
            total_amount_cents: 9_000,
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
    fn test_confirmed_unpaid_booking_is_payable() {
        let b = booking(BookingStatus::Confirmed, PaymentStatus::Unpaid, true);
        assert!(ensure_payable(&b).is_ok());

        let retry = booking(BookingStatus::Confirmed, PaymentStatus::Processing, true);
        assert!(ensure_payable(&retry).is_ok());
    }

    #[test]
    fn test_pending_booking_is_not_payable() {
        let b = booking(BookingStatus::Pending, PaymentStatus::Unpaid, false);
        assert!(matches!(ensure_payable(&b), Err(PaymentError::NotPayable(_))));
    }

    #[test]
    fn test_paid_booking_is_rejected() {
        let b = booking(BookingStatus::Completed, PaymentStatus::Paid, true);
        assert!(matches!(ensure_payable(&b), Err(PaymentError::AlreadyPaid)));
    }

    #[test]
    fn test_failed_payment_is_not_payable() {
        let b = booking(BookingStatus::Confirmed, PaymentStatus::Failed, true);
        assert!(matches!(ensure_payable(&b), Err(PaymentError::NotPayable(_))));
    }
}
