use std::time::Duration;

use sqlx::PgPool;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::service::cancel_expired_bookings;

/// Configuration of the expiry sweep.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often to cancel expired pending bookings (default: 5 minutes)
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
        }
    }
}

impl SweeperConfig {
    /// Reads `BOOKING_SWEEP_INTERVAL_SECS`, falling back to the default.
    pub fn from_env() -> Self {
        std::env::var("BOOKING_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(|secs| Self {
                interval: Duration::from_secs(secs),
            })
            .unwrap_or_default()
    }
}

/// Periodically releases dates held by bookings whose confirmation code expired.
pub struct BookingExpirySweeper {
    pool: PgPool,
    config: SweeperConfig,
}

impl BookingExpirySweeper {
    /// Creates a sweeper; `None` uses the default configuration.
    pub fn new(pool: PgPool, config: Option<SweeperConfig>) -> Self {
        Self {
            pool,
            config: config.unwrap_or_default(),
        }
    }

    /// Runs one sweep. Returns how many bookings were cancelled.
    pub async fn sweep_once(&self) -> u64 {
        match cancel_expired_bookings(&self.pool).await {
            Ok(0) => {
                debug!("No expired bookings to cancel");
                0
            }
            Ok(count) => {
                info!("Cancelled {} expired pending bookings", count);
                count
            }
            Err(e) => {
                error!("Booking expiry sweep failed: {}", e);
                0
            }
        }
    }

    /// Sweeps immediately, then on every tick. Never returns.
    pub async fn start(&self) {
        info!(
            "Booking expiry sweeper running every {:?}",
            self.config.interval
        );

        let mut ticker = interval(self.config.interval);
        loop {
            // The first tick completes immediately.
            ticker.tick().await;
            self.sweep_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interval_is_five_minutes() {
        assert_eq!(SweeperConfig::default().interval, Duration::from_secs(300));
    }
}
