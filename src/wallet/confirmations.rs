//! Short-TTL cache of the remote chain tip for confirmation arithmetic.
//!
//! Confirmation counts are `tip - tx_height + 1`, so the only quantity that
//! varies is the shared tip height. One cached entry serves every
//! transaction; there is no per-transaction caching. Reads within the TTL are
//! answered synchronously, a stale read triggers a refetch before answering,
//! and concurrent refetches are collapsed into a single engine call.

use crate::engine::WalletEngine;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Configuration for the tip-height cache.
#[derive(Debug, Clone)]
pub struct ConfirmationCacheConfig {
    /// How long a fetched tip height stays fresh.
    pub ttl: Duration,
}

impl Default for ConfirmationCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedHeight {
    height: u32,
    fetched_at: Instant,
}

/// Cache of the current remote block height.
///
/// The cache is the sole owner of its entry; other components only ever see
/// computed confirmation counts or copied heights.
pub struct ConfirmationCache {
    engine: Arc<dyn WalletEngine>,
    config: ConfirmationCacheConfig,
    entry: Mutex<Option<CachedHeight>>,
    /// Single permit for refreshes: a caller that finds the permit taken
    /// waits for the holder and then reads the freshly cached value instead
    /// of issuing its own request.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ConfirmationCache {
    pub fn new(engine: Arc<dyn WalletEngine>, config: ConfirmationCacheConfig) -> Self {
        Self {
            engine,
            config,
            entry: Mutex::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Confirmation count for a transaction mined at `tx_block_height`,
    /// refreshing the tip first when the cache is stale.
    ///
    /// Returns `None` when no tip height could be obtained; the caller falls
    /// back to a previously stored confirmation count.
    pub async fn confirmations_for(&self, tx_block_height: u32) -> Option<u32> {
        let tip = match self.fresh_height() {
            Some(height) => Some(height),
            None => self.refresh_height().await,
        };
        tip.map(|tip| confirmations(tip, tx_block_height))
    }

    /// Non-blocking variant: answers from the cache only, `None` once the TTL
    /// has expired until some refresh completes.
    pub fn cached_confirmations_for(&self, tx_block_height: u32) -> Option<u32> {
        self.fresh_height()
            .map(|tip| confirmations(tip, tx_block_height))
    }

    /// Fetch the current tip height from the engine, joining an in-flight
    /// fetch instead of duplicating it.
    ///
    /// On failure the last good value is returned while it is younger than
    /// twice the TTL; after that, `None`.
    pub async fn refresh_height(&self) -> Option<u32> {
        let _permit = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited for the permit.
        if let Some(height) = self.fresh_height() {
            return Some(height);
        }

        match self.engine.get_current_block_height().await {
            Ok(height) => {
                debug!("refreshed chain tip: {}", height);
                *self.entry.lock().unwrap() = Some(CachedHeight {
                    height,
                    fetched_at: Instant::now(),
                });
                Some(height)
            }
            Err(e) => {
                warn!("tip height refresh failed: {}", e);
                let entry = *self.entry.lock().unwrap();
                entry
                    .filter(|cached| cached.fetched_at.elapsed() < self.config.ttl * 2)
                    .map(|cached| cached.height)
            }
        }
    }

    fn fresh_height(&self) -> Option<u32> {
        let entry = *self.entry.lock().unwrap();
        entry
            .filter(|cached| cached.fetched_at.elapsed() < self.config.ttl)
            .map(|cached| cached.height)
    }
}

fn confirmations(tip: u32, tx_block_height: u32) -> u32 {
    if tip >= tx_block_height {
        tip - tx_block_height + 1
    } else {
        // Tip behind the transaction's block, e.g. right after a reorg or a
        // lagging server; report the minimum a mined transaction can have.
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedEngine;
    use std::sync::atomic::Ordering;

    fn cache_with_height(height: u32) -> (Arc<ScriptedEngine>, ConfirmationCache) {
        let engine = Arc::new(ScriptedEngine::new(vec![]));
        engine.set_height(height);
        let cache = ConfirmationCache::new(engine.clone(), ConfirmationCacheConfig::default());
        (engine, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_cache_answers_without_refetch() {
        let (engine, cache) = cache_with_height(500_000);

        assert_eq!(cache.confirmations_for(499_995).await, Some(6));
        assert_eq!(engine.height_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.confirmations_for(499_995).await, Some(6));
        assert_eq!(engine.height_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_cache_refetches_before_answering() {
        let (engine, cache) = cache_with_height(500_000);
        assert_eq!(cache.confirmations_for(499_995).await, Some(6));

        tokio::time::advance(Duration::from_secs(31)).await;
        engine.set_height(500_003);
        assert_eq!(cache.confirmations_for(499_995).await, Some(9));
        assert_eq!(engine.height_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_reads_return_none_after_expiry_until_refresh() {
        let (_engine, cache) = cache_with_height(500_000);
        cache.refresh_height().await;

        assert_eq!(cache.cached_confirmations_for(499_995), Some(6));
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.cached_confirmations_for(499_995), None);

        cache.refresh_height().await;
        assert_eq!(cache.cached_confirmations_for(499_995), Some(6));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_fetch() {
        let engine = Arc::new(ScriptedEngine::new(vec![]));
        engine.set_height(700_000);
        engine.set_height_delay(Duration::from_millis(100));
        let cache = Arc::new(ConfirmationCache::new(
            engine.clone(),
            ConfirmationCacheConfig::default(),
        ));

        let first = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh_height().await })
        };
        let second = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh_height().await })
        };

        assert_eq!(first.await.unwrap(), Some(700_000));
        assert_eq!(second.await.unwrap(), Some(700_000));
        assert_eq!(engine.height_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_falls_back_within_twice_ttl() {
        let (engine, cache) = cache_with_height(500_000);
        cache.refresh_height().await;

        engine.fail_height(true);
        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(cache.refresh_height().await, Some(500_000));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.refresh_height().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn tip_behind_transaction_reports_single_confirmation() {
        let (_engine, cache) = cache_with_height(400_000);
        assert_eq!(cache.confirmations_for(400_005).await, Some(1));
    }
}
