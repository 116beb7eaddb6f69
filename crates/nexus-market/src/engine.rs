//! Event-study engine: data fetching, CAR computation and memoization

use crate::cache::{CarCache, CarCacheKey};
use crate::config::{MarketConfig, WindowConfig};
use crate::error::{DataError, MarketError, Result, StudyError};
use crate::event_study::{CarEvent, CarSummary, EventSpec, compute_car_aligned};
use crate::loader::MarketDataLoader;
use crate::series::{AlignedReturns, PriceSeries, ReturnSeries, align};
use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// An event whose study failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFailure {
    pub event_id: String,
    pub reason: String,
    #[serde(skip)]
    pub error: StudyError,
}

/// Outcome of studying several events for one ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyBatch {
    pub ticker: String,
    pub benchmark: String,
    pub results: Vec<CarEvent>,
    pub failures: Vec<EventFailure>,
    /// Events dated outside the loaded data range
    pub skipped: Vec<String>,
    pub summary: Option<CarSummary>,
}

impl StudyBatch {
    fn new(ticker: &str, benchmark: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            benchmark: benchmark.to_string(),
            results: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            summary: None,
        }
    }

    pub fn get(&self, event_id: &str) -> Option<&CarEvent> {
        self.results.iter().find(|r| r.event_id == event_id)
    }
}

/// Runs event studies against a [`MarketDataLoader`].
///
/// Built once at startup and shared; the [`CarCache`] it owns is the only
/// mutable state and is safe to use from concurrent turns.
pub struct EventStudyEngine {
    loader: Arc<dyn MarketDataLoader>,
    cache: CarCache,
    request_timeout: Duration,
}

impl EventStudyEngine {
    pub fn new(loader: Arc<dyn MarketDataLoader>, cache: CarCache) -> Self {
        Self {
            loader,
            cache,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(loader: Arc<dyn MarketDataLoader>, config: &MarketConfig) -> Self {
        Self::new(loader, CarCache::new(config.cache_ttl)).with_request_timeout(config.request_timeout)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &CarCache {
        &self.cache
    }

    pub fn loader(&self) -> &Arc<dyn MarketDataLoader> {
        &self.loader
    }

    /// Fetch one return series, bounded by the request timeout
    pub async fn fetch_returns(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<ReturnSeries, DataError> {
        let started = Instant::now();
        let result = self.bounded(ticker, self.loader.get_returns(ticker, start, end)).await;
        match &result {
            Ok(series) => debug!(
                ticker,
                points = series.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "fetched returns"
            ),
            Err(e) => warn!(ticker, error = %e, "return fetch failed"),
        }
        result
    }

    /// Fetch one price series, bounded by the request timeout
    pub async fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<PriceSeries, DataError> {
        let result = self.bounded(ticker, self.loader.get_prices(ticker, start, end)).await;
        if let Err(e) = &result {
            warn!(ticker, error = %e, "price fetch failed");
        }
        result
    }

    async fn bounded<T>(
        &self,
        ticker: &str,
        fetch: impl Future<Output = std::result::Result<T, DataError>>,
    ) -> std::result::Result<T, DataError> {
        tokio::time::timeout(self.request_timeout, fetch)
            .await
            .unwrap_or_else(|_| {
                Err(DataError::unavailable(
                    ticker,
                    format!("request timed out after {}ms", self.request_timeout.as_millis()),
                ))
            })
    }

    /// Fetch subject and benchmark concurrently
    pub async fn fetch_pair(
        &self,
        ticker: &str,
        benchmark: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(ReturnSeries, ReturnSeries)> {
        let (subject, bench) = tokio::try_join!(
            self.fetch_returns(ticker, start, end),
            self.fetch_returns(benchmark, start, end),
        )?;
        Ok((subject, bench))
    }

    /// CAR of `ticker` around one event, served from the cache when possible
    pub async fn study(
        &self,
        ticker: &str,
        benchmark: &str,
        event: &EventSpec,
        window: &WindowConfig,
    ) -> Result<CarEvent> {
        window.validate()?;
        let key = CarCacheKey::new(ticker, benchmark, event, *window);
        self.cache
            .get_or_compute(key, || async {
                let (start, end) = fetch_range(std::slice::from_ref(event), window);
                let (subject, bench) = self.fetch_pair(ticker, benchmark, start, end).await?;
                let car = compute_car_aligned(&align(&subject, &bench), event, window)?;
                log_car(&car);
                Ok::<_, MarketError>(car)
            })
            .await
    }

    /// Study every event with a single fetch per series.
    ///
    /// A fetch failure fails the batch; a study failure only fails its event.
    pub async fn study_many(
        &self,
        ticker: &str,
        benchmark: &str,
        events: &[EventSpec],
        window: &WindowConfig,
    ) -> Result<StudyBatch> {
        window.validate()?;
        if events.is_empty() {
            return Ok(StudyBatch::new(ticker, benchmark));
        }

        let (start, end) = fetch_range(events, window);
        let (subject, bench) = self.fetch_pair(ticker, benchmark, start, end).await?;
        Ok(self.study_aligned(&align(&subject, &bench), events, window).await)
    }

    /// Study every event over already aligned series
    pub async fn study_aligned(
        &self,
        data: &AlignedReturns,
        events: &[EventSpec],
        window: &WindowConfig,
    ) -> StudyBatch {
        let mut batch = StudyBatch::new(&data.subject_ticker, &data.benchmark_ticker);
        let (Some(first), Some(last)) = (data.dates.first().copied(), data.dates.last().copied()) else {
            batch.skipped = events.iter().map(|e| e.id.clone()).collect();
            return batch;
        };

        for event in events {
            if event.date < first || event.date > last {
                debug!(ticker = %data.subject_ticker, event_id = %event.id, "event outside data range");
                batch.skipped.push(event.id.clone());
                continue;
            }

            let key = CarCacheKey::new(&data.subject_ticker, &data.benchmark_ticker, event, *window);
            let outcome = self
                .cache
                .get_or_compute(key, || async {
                    let car = compute_car_aligned(data, event, window);
                    if let Ok(car) = &car {
                        log_car(car);
                    }
                    car
                })
                .await;

            match outcome {
                Ok(car) => batch.results.push(car),
                Err(error) => {
                    warn!(
                        ticker = %data.subject_ticker,
                        event_id = %event.id,
                        error = %error,
                        "event study failed"
                    );
                    batch.failures.push(EventFailure {
                        event_id: event.id.clone(),
                        reason: error.to_string(),
                        error,
                    });
                }
            }
        }

        batch.summary = CarSummary::from_results(&batch.results);
        info!(
            ticker = %batch.ticker,
            computed = batch.results.len(),
            failed = batch.failures.len(),
            skipped = batch.skipped.len(),
            "event studies complete"
        );
        batch
    }
}

impl std::fmt::Debug for EventStudyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStudyEngine")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

fn log_car(car: &CarEvent) {
    info!(
        ticker = %car.ticker,
        event_id = %car.event_id,
        car = car.car,
        t_statistic = car.t_statistic,
        significant = car.significant,
        "computed CAR"
    );
}

/// Calendar range that covers the estimation and event windows of every event
pub(crate) fn fetch_range(events: &[EventSpec], window: &WindowConfig) -> (NaiveDate, NaiveDate) {
    let earliest = events.iter().map(|e| e.date).min().unwrap_or_default();
    let latest = events.iter().map(|e| e.date).max().unwrap_or_default();
    let start = TimeDelta::try_days(window.lookback_days())
        .and_then(|days| earliest.checked_sub_signed(days))
        .unwrap_or(NaiveDate::MIN);
    let end = TimeDelta::try_days(window.lookahead_days())
        .and_then(|days| latest.checked_add_signed(days))
        .unwrap_or(NaiveDate::MAX);
    (start, end)
}
