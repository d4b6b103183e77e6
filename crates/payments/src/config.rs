use log::warn;

/// Default share of each booking kept by the platform, in percent.
pub const DEFAULT_SERVICE_FEE_PERCENT: f64 = 3.0;

/// Settings for checkout and webhook handling.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Stripe secret API key
    pub secret_key: String,
    /// Webhook signing secret; unsigned events are accepted when absent
    pub webhook_secret: Option<String>,
    /// Platform fee in percent of the booking amount
    pub service_fee_percent: f64,
    /// Public base URL of this API, used for the success redirect
    pub backend_url: String,
    /// Public base URL of the frontend, used for the cancel redirect
    pub frontend_url: String,
    /// ISO currency code charged
    pub currency: String,
}

impl PaymentConfig {
    /// Builds a configuration from explicit values.
    pub fn new(
        secret_key: impl Into<String>,
        webhook_secret: Option<String>,
        service_fee_percent: f64,
        backend_url: impl Into<String>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret,
            service_fee_percent,
            backend_url: trim_base(backend_url.into()),
            frontend_url: trim_base(frontend_url.into()),
            currency: "usd".to_string(),
        }
    }

    /// Reads `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`,
    /// `SERVICE_FEE_PERCENT`, `BACKEND_URL` and `FRONTEND_URL`.
    pub fn from_env() -> Self {
        let secret_key = std::env::var("STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("⚠️ STRIPE_SECRET_KEY not set, checkout will fail");
            String::new()
        });

        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if webhook_secret.is_none() {
            warn!("⚠️ STRIPE_WEBHOOK_SECRET not set, webhook signatures will not be checked");
        }

        let service_fee_percent = std::env::var("SERVICE_FEE_PERCENT")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|pct| (0.0..100.0).contains(pct))
            .unwrap_or(DEFAULT_SERVICE_FEE_PERCENT);

        let backend_url =
            std::env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Self::new(
            secret_key,
            webhook_secret,
            service_fee_percent,
            backend_url,
            frontend_url,
        )
    }

    /// Where Stripe sends the traveler after paying.
    pub fn success_url(&self) -> String {
        format!(
            "{}/api/payments/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.backend_url
        )
    }

    /// Where Stripe sends the traveler after abandoning checkout.
    pub fn cancel_url(&self) -> String {
        format!("{}/payment-cancelled", self.frontend_url)
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_urls() {
        let config = PaymentConfig::new(
            "sk_test_123",
            None,
            3.0,
            "https://api.rvnbo.com/",
            "https://rvnbo.com",
        );

        assert_eq!(
            config.success_url(),
            "https://api.rvnbo.com/api/payments/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(config.cancel_url(), "https://rvnbo.com/payment-cancelled");
        assert_eq!(config.currency, "usd");
    }
}
