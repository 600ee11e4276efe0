use crate::geo::CacheKey;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::{debug, instrument};

struct CacheEntry<V> {
    data: V,
    expires_at: Instant,
}

/// Shared TTL cache for provider payloads.
///
/// Entries are replaced wholesale on refresh. A failed populate stores
/// nothing and leaves any previous entry in place. A successful populate
/// also drops every expired entry. Concurrent misses on the
/// same key may both populate; the last writer wins.
pub struct ForecastCache<V> {
    cache: Arc<RwLock<HashMap<CacheKey, CacheEntry<V>>>>,
}

impl<V: Clone> ForecastCache<V> {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let cache = self.cache.read().await;
        if let Some(entry) = cache.get(key)
            && entry.expires_at > Instant::now()
        {
            return Some(entry.data.clone());
        }
        None
    }

    pub async fn set(&self, key: CacheKey, data: V, ttl: Duration) {
        let mut cache = self.cache.write().await;
        cache.insert(
            key,
            CacheEntry {
                data,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    #[instrument(skip(self, key, populate), fields(key = %key))]
    pub async fn get_or_populate<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        populate: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(cached) = self.get(key).await {
            debug!("Cache hit");
            return Ok(cached);
        }

        debug!("Cache miss");
        let data = populate().await?;
        let purged = self.purge_expired().await;
        if purged > 0 {
            debug!(purged, "Dropped expired entries");
        }
        self.set(key.clone(), data.clone(), ttl).await;
        Ok(data)
    }

    /// Drop every entry whose expiry has passed; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        let now = Instant::now();
        cache.retain(|_, entry| entry.expires_at > now);
        before - cache.len()
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }
}

impl<V: Clone> Default for ForecastCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Endpoint, RequestShape};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(lat: f64) -> CacheKey {
        let shape = RequestShape {
            forecast_days: 7,
            timezone: None,
        };
        CacheKey::new(Endpoint::AirQuality, lat, 90.41, 2, &shape)
    }

    #[tokio::test(start_paused = true)]
    async fn populates_once_per_ttl_window() {
        let cache: ForecastCache<u32> = ForecastCache::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let ttl = Duration::from_secs(1800);
        let populate = move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
            Ok::<_, String>(n)
        };

        assert_eq!(cache.get_or_populate(&key(23.81), ttl, populate).await, Ok(0));
        assert_eq!(cache.get_or_populate(&key(23.81), ttl, populate).await, Ok(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1801)).await;

        assert_eq!(cache.get_or_populate(&key(23.81), ttl, populate).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn never_returns_an_expired_entry() {
        let cache: ForecastCache<&str> = ForecastCache::new();
        cache
            .set(key(23.81), "fresh", Duration::from_secs(60))
            .await;

        assert_eq!(cache.get(&key(23.81)).await, Some("fresh"));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.get(&key(23.81)).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_populate_keeps_previous_entry() {
        let cache: ForecastCache<&str> = ForecastCache::new();
        let ttl = Duration::from_secs(60);

        let err = cache
            .get_or_populate(&key(23.81), ttl, || async { Err::<&str, _>("provider down") })
            .await;
        assert_eq!(err, Err("provider down"));
        assert_eq!(cache.len().await, 0);

        cache.set(key(23.81), "old", ttl).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        let err = cache
            .get_or_populate(&key(23.81), ttl, || async { Err::<&str, _>("provider down") })
            .await;
        assert_eq!(err, Err("provider down"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn miss_drops_expired_entries() {
        let cache: ForecastCache<u8> = ForecastCache::new();
        let ttl = Duration::from_secs(10);
        cache.set(key(23.81), 1, ttl).await;
        cache.set(key(22.33), 2, ttl).await;

        tokio::time::advance(Duration::from_secs(11)).await;

        let fresh = cache
            .get_or_populate(&key(24.89), ttl, || async { Ok::<_, String>(3) })
            .await;
        assert_eq!(fresh, Ok(3));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purges_only_expired_entries() {
        let cache: ForecastCache<u8> = ForecastCache::new();
        cache.set(key(23.81), 1, Duration::from_secs(10)).await;
        cache.set(key(22.33), 2, Duration::from_secs(100)).await;

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.get(&key(22.33)).await, Some(2));
    }
}
