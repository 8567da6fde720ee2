//! Process-global, ref-counted cache of MCP backing connections keyed by
//! [`super::instance_key`] (§5). A cache entry is torn down once its
//! ref-count reaches zero and a grace timer expires, so two sessions
//! releasing and re-acquiring the same key in quick succession share one
//! connection instead of tearing it down and respawning it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

struct CacheEntry<T> {
    value: Arc<T>,
    ref_count: usize,
}

/// Default grace period before an unreferenced entry is torn down (§5).
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

pub struct McpInstanceCache<T> {
    entries: Arc<Mutex<HashMap<String, CacheEntry<T>>>>,
    grace_period: Duration,
}

impl<T> Clone for McpInstanceCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            grace_period: self.grace_period,
        }
    }
}

impl<T: Send + Sync + 'static> McpInstanceCache<T> {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            grace_period,
        }
    }

    /// Acquire the shared instance for `key`, constructing it with `factory`
    /// if this is the first caller, and bumping the ref count otherwise.
    pub async fn acquire_with<F, Fut>(&self, key: &str, factory: F) -> Arc<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.ref_count += 1;
            return entry.value.clone();
        }
        let value = Arc::new(factory().await);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                ref_count: 1,
            },
        );
        value
    }

    /// Release one reference to `key`. When the ref count reaches zero, the
    /// entry is scheduled for removal after the grace period, cancelled if
    /// another `acquire_with` call for the same key lands in the meantime.
    pub async fn release(&self, key: &str) {
        let should_schedule = {
            let mut entries = self.entries.lock().await;
            match entries.get_mut(key) {
                Some(entry) => {
                    entry.ref_count = entry.ref_count.saturating_sub(1);
                    entry.ref_count == 0
                }
                None => false,
            }
        };

        if !should_schedule {
            return;
        }

        let entries = self.entries.clone();
        let key = key.to_string();
        let grace_period = self.grace_period;
        tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            let mut entries = entries.lock().await;
            if matches!(entries.get(&key), Some(entry) if entry.ref_count == 0) {
                entries.remove(&key);
                debug!(key, "tore down idle MCP instance");
            }
        });
    }

    #[cfg(test)]
    async fn ref_count(&self, key: &str) -> Option<usize> {
        self.entries.lock().await.get(key).map(|e| e.ref_count)
    }

    #[cfg(test)]
    async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_acquires_share_one_instance() {
        let cache: McpInstanceCache<u32> = McpInstanceCache::new(Duration::from_millis(50));
        let a = cache.acquire_with("k", || async { 1u32 }).await;
        let b = cache.acquire_with("k", || async { 2u32 }).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.ref_count("k").await, Some(2));
    }

    #[tokio::test]
    async fn release_to_zero_tears_down_after_grace_period() {
        let cache: McpInstanceCache<u32> = McpInstanceCache::new(Duration::from_millis(20));
        cache.acquire_with("k", || async { 1u32 }).await;
        cache.release("k").await;
        assert!(cache.contains("k").await);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!cache.contains("k").await);
    }

    #[tokio::test]
    async fn reacquire_before_grace_expiry_cancels_teardown() {
        let cache: McpInstanceCache<u32> = McpInstanceCache::new(Duration::from_millis(80));
        cache.acquire_with("k", || async { 1u32 }).await;
        cache.release("k").await;

        cache.acquire_with("k", || async { 2u32 }).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.contains("k").await);
    }
}
