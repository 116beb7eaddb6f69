//! Session cache of computed CARs

use crate::config::WindowConfig;
use crate::event_study::{CarEvent, EventSpec};
use chrono::NaiveDate;
use cached::{Cached, TimedCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Identity of a CAR computation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CarCacheKey {
    pub ticker: String,
    pub benchmark: String,
    pub event_id: String,
    /// A corrected date under an existing id is a different computation
    pub event_date: NaiveDate,
    pub window: WindowConfig,
}

impl CarCacheKey {
    pub fn new(ticker: &str, benchmark: &str, event: &EventSpec, window: WindowConfig) -> Self {
        Self {
            ticker: ticker.to_uppercase(),
            benchmark: benchmark.to_uppercase(),
            event_id: event.id.clone(),
            event_date: event.date,
            window,
        }
    }
}

/// Shared, time-limited cache of [`CarEvent`]s.
///
/// Clones share storage. Every mutation holds the write lock for the
/// duration of the mutation only, so readers never see a partial entry.
#[derive(Clone)]
pub struct CarCache {
    cache: Arc<RwLock<TimedCache<CarCacheKey, CarEvent>>>,
}

impl CarCache {
    /// Create a cache whose entries expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Look up a cached result
    pub async fn get(&self, key: &CarCacheKey) -> Option<CarEvent> {
        // TimedCache evicts expired entries on read, which needs `&mut`.
        let mut cache = self.cache.write().await;
        let hit = cache.cache_get(key).cloned();
        debug!(
            ticker = %key.ticker,
            event_id = %key.event_id,
            hit = hit.is_some(),
            "car cache lookup"
        );
        hit
    }

    /// Store a result
    pub async fn insert(&self, key: CarCacheKey, value: CarEvent) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value or compute, cache and return it.
    ///
    /// Errors are returned as-is and never cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: CarCacheKey, compute: F) -> Result<CarEvent, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<CarEvent, E>>,
    {
        if let Some(hit) = self.get(&key).await {
            return Ok(hit);
        }

        let value = compute().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    /// Drop one entry
    pub async fn invalidate(&self, key: &CarCacheKey) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(key);
    }

    /// Drop every entry
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for CarCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl std::fmt::Debug for CarCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ymd;
    use crate::market_model::MarketModelParameters;

    pub(crate) fn sample_car(ticker: &str, event_id: &str, car: f64) -> CarEvent {
        CarEvent {
            event_id: event_id.to_string(),
            event_title: "test".to_string(),
            ticker: ticker.to_string(),
            benchmark: "SPY".to_string(),
            event_date: ymd(2022, 10, 7),
            resolved_date: ymd(2022, 10, 7),
            window_start: ymd(2022, 10, 6),
            window_end: ymd(2022, 10, 14),
            car,
            raw_return: car,
            benchmark_return: 0.0,
            t_statistic: 0.0,
            p_value: 1.0,
            significant: false,
            estimation_days: 120,
            degrees_of_freedom: 119,
            model: MarketModelParameters {
                alpha: 0.0,
                beta: 1.0,
                residual_std_dev: 0.0,
                observations: 120,
            },
            abnormal_returns: Vec::new(),
        }
    }

    fn event(id: &str) -> EventSpec {
        EventSpec::new(id, ymd(2022, 10, 7), "test")
    }

    fn key(event_id: &str) -> CarCacheKey {
        CarCacheKey::new("nvda", "spy", &event(event_id), WindowConfig::default())
    }

    #[test]
    fn test_key_normalizes_tickers() {
        assert_eq!(key("e1").ticker, "NVDA");
        assert_ne!(
            key("e1"),
            CarCacheKey::new(
                "NVDA",
                "SPY",
                &event("e1"),
                WindowConfig::default().with_event_window(0, 1)
            )
        );
    }

    #[tokio::test]
    async fn test_redated_event_misses() {
        let cache = CarCache::new(Duration::from_secs(60));
        cache.insert(key("e1"), sample_car("NVDA", "e1", 0.1)).await;

        let redated = EventSpec::new("e1", ymd(2022, 10, 11), "test");
        let moved = CarCacheKey::new("NVDA", "SPY", &redated, WindowConfig::default());
        assert_ne!(moved, key("e1"));
        assert!(cache.get(&moved).await.is_none());
        assert!(cache.get(&key("e1")).await.is_some());
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = CarCache::new(Duration::from_secs(60));
        assert!(cache.is_empty().await);

        cache.insert(key("e1"), sample_car("NVDA", "e1", 0.1)).await;

        assert_eq!(cache.get(&key("e1")).await.map(|c| c.car), Some(0.1));
        assert!(cache.get(&key("e2")).await.is_none());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_caches_only_success() {
        let cache = CarCache::new(Duration::from_secs(60));

        let err = cache
            .get_or_compute(key("e1"), || async { Err::<CarEvent, _>("boom") })
            .await;
        assert_eq!(err.unwrap_err(), "boom");
        assert!(cache.is_empty().await);

        let mut calls = 0;
        for _ in 0..2 {
            let result = cache
                .get_or_compute(key("e1"), || {
                    calls += 1;
                    async { Ok::<_, String>(sample_car("NVDA", "e1", -0.2)) }
                })
                .await
                .unwrap();
            assert_eq!(result.car, -0.2);
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = CarCache::default();
        cache.insert(key("e1"), sample_car("NVDA", "e1", 0.1)).await;
        cache.insert(key("e2"), sample_car("NVDA", "e2", 0.2)).await;

        cache.invalidate(&key("e1")).await;
        assert_eq!(cache.len().await, 1);

        let shared = cache.clone();
        shared.clear().await;
        assert!(cache.is_empty().await);
    }
}
