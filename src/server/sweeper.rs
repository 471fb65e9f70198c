use crate::application_port::AuthError;
use crate::domain_port::{Clock, TokenStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Periodically drops revoked and fully expired pairs from the token store.
pub struct TokenSweeper {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    cancellation_token: CancellationToken,
}

impl TokenSweeper {
    pub fn new(
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            clock,
            interval,
            cancellation_token,
        }
    }

    async fn tick_once(&self) -> Result<u64, AuthError> {
        self.store.purge(self.clock.now()).await
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("token sweeper shutting down...");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick_once().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "purged dead token pairs"),
                        Err(e) => tracing::warn!("token sweep failed: {}", e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::*;
    use crate::domain_port::ManualClock;
    use crate::infra_memory::MemoryTokenStore;
    use chrono::{Duration as ChronoDuration, Utc};

    #[tokio::test]
    async fn removes_revoked_pairs_until_cancelled() {
        let now = Utc::now();
        let store = MemoryTokenStore::new();
        let principal = PrincipalKey::new(PrincipalKind::Patient, "p1");
        let pair = TokenPair {
            principal: principal.clone(),
            access_token: AccessToken("a".into()),
            refresh_token: RefreshToken("r".into()),
            issued_at: now,
            access_expires_at: now + ChronoDuration::seconds(60),
            refresh_expires_at: now + ChronoDuration::seconds(600),
            revoked: false,
        };
        store.put(&pair).await.unwrap();
        store.revoke(&principal, &pair.refresh_token).await.unwrap();

        let cancel = CancellationToken::new();
        let sweeper = TokenSweeper::new(
            Arc::new(store.clone()),
            Arc::new(ManualClock::new(now)),
            Duration::from_millis(10),
            cancel.clone(),
        );
        let handle = tokio::spawn(async move { sweeper.run().await });

        for _ in 0..100 {
            if store.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
