use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use bookings::{BookingExpirySweeper, SweeperConfig};
use notification_services::{VerificationStore, purge_expired_codes};

/// How often stale account and reset codes are dropped.
const CODE_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Owns the background jobs that release expired state: pending bookings
/// past their confirmation deadline and stale verification codes.
pub struct ExpiryManager {
    pool: PgPool,
    store: VerificationStore,
    sweeper_config: SweeperConfig,
    handles: Vec<JoinHandle<()>>,
}

impl ExpiryManager {
    /// Create a new expiry manager
    pub fn new(pool: PgPool, store: VerificationStore, sweeper_config: SweeperConfig) -> Self {
        Self {
            pool,
            store,
            sweeper_config,
            handles: Vec::new(),
        }
    }

    /// Spawns the jobs. Calling it twice restarts them.
    pub fn start(&mut self) {
        self.abort_all();
        info!("Starting expiry jobs");

        let sweeper = BookingExpirySweeper::new(self.pool.clone(), Some(self.sweeper_config.clone()));
        self.handles.push(tokio::spawn(async move {
            sweeper.start().await;
        }));

        let store = self.store.clone();
        self.handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CODE_PURGE_INTERVAL);
            loop {
                ticker.tick().await;
                let purged = purge_expired_codes(&store);
                if purged > 0 {
                    debug!("Purged {} expired verification codes", purged);
                }
            }
        }));
    }

    /// Whether the jobs are running.
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Stops the jobs and waits for them to wind down.
    pub async fn stop(&mut self) {
        info!("Stopping expiry jobs");
        for handle in self.handles.drain(..) {
            handle.abort();
            let _ = handle.await;
        }
    }

    fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ExpiryManager {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notification_services::create_verification_store;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_start_and_stop() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/rv_marketplace_test")
            .unwrap();
        let mut manager = ExpiryManager::new(
            pool,
            create_verification_store(),
            SweeperConfig::default(),
        );

        manager.start();
        assert!(manager.is_running());

        manager.stop().await;
        assert!(!manager.is_running());
    }
}
