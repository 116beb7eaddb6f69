//! Ecosystem/competitor comparison across a set of tickers

use crate::config::WindowConfig;
use crate::engine::{EventStudyEngine, fetch_range};
use crate::error::{MarketError, Result};
use crate::event_study::EventSpec;
use crate::series::{ReturnSeries, align};
use crate::stats;
use crate::universe;
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// What to compare
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRequest {
    pub tickers: Vec<String>,
    pub benchmark: String,
    pub start: NaiveDate,
    /// Defaults to today
    pub end: Option<NaiveDate>,
    pub events: Vec<EventSpec>,
    pub window: WindowConfig,
    pub correlation_window: usize,
}

impl ComparisonRequest {
    pub fn new<I, S>(tickers: I, start: NaiveDate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ticker in tickers {
            let ticker = ticker.as_ref().trim().to_uppercase();
            if !ticker.is_empty() && !normalized.contains(&ticker) {
                normalized.push(ticker);
            }
        }
        Self {
            tickers: normalized,
            benchmark: "SPY".to_string(),
            start,
            end: None,
            events: Vec::new(),
            window: WindowConfig::default(),
            correlation_window: 30,
        }
    }

    pub fn with_benchmark(mut self, benchmark: &str) -> Self {
        self.benchmark = benchmark.trim().to_uppercase();
        self
    }

    pub fn with_end(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_events(mut self, events: Vec<EventSpec>) -> Self {
        self.events = events;
        self
    }

    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    pub fn with_correlation_window(mut self, days: usize) -> Self {
        self.correlation_window = days;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tickers.is_empty() {
            return Err(MarketError::Config("at least one ticker is required".to_string()));
        }
        if self.correlation_window < 2 {
            return Err(MarketError::Config(
                "correlation window must be at least 2 days".to_string(),
            ));
        }
        if self.end.is_some_and(|end| end < self.start) {
            return Err(MarketError::Config(format!(
                "end date is before start date {}",
                self.start
            )));
        }
        self.window.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Study,
}

/// A ticker (or one of its events) left out of the comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerFailure {
    pub ticker: String,
    pub stage: FailureStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub reason: String,
}

/// Whole-period metrics for one ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerSummary {
    pub ticker: String,
    pub name: Option<&'static str>,
    pub group: Option<&'static str>,
    pub export_exposure: Option<&'static str>,
    pub trading_days: usize,
    pub cumulative_return: f64,
    pub annualized_volatility: Option<f64>,
    pub beta: Option<f64>,
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerEventResult {
    pub ticker: String,
    pub car: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    /// Sum of daily returns over the event window
    pub raw_return: f64,
    /// Compounded price change from window start to window end
    pub window_return: f64,
    /// `window_return` minus the benchmark's
    pub alpha: f64,
}

/// Every ticker's outcome for one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventComparison {
    pub event_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub benchmark_return: Option<f64>,
    pub results: Vec<TickerEventResult>,
    /// Highest window return; ties go to the earlier requested ticker
    pub winner: Option<String>,
}

impl EventComparison {
    pub fn result(&self, ticker: &str) -> Option<&TickerEventResult> {
        self.results.iter().find(|r| r.ticker == ticker)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarSpread {
    pub event_id: String,
    /// CAR of `a` minus CAR of `b`
    pub spread: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationSummary {
    pub window: usize,
    pub latest: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub points: usize,
}

/// Head-to-head scorecard for two tickers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairComparison {
    pub a: String,
    pub b: String,
    pub spreads: Vec<CarSpread>,
    pub mean_spread: Option<f64>,
    /// Events where `a`'s raw return beat `b`'s
    pub a_wins: usize,
    pub b_wins: usize,
    pub ties: usize,
    pub rolling_correlation: Option<CorrelationSummary>,
}

/// Averages over a subset of events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventAggregate {
    pub events: usize,
    pub average_window_return: BTreeMap<String, f64>,
    pub average_car: BTreeMap<String, f64>,
    pub wins: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub benchmark: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Tickers with data, in request order
    pub tickers: Vec<String>,
    pub summaries: Vec<TickerSummary>,
    pub events: Vec<EventComparison>,
    pub pairs: Vec<PairComparison>,
    pub failures: Vec<TickerFailure>,
}

impl ComparisonReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Tickers that could not be fetched at all
    pub fn failed_tickers(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter(|f| f.stage == FailureStage::Fetch)
            .map(|f| f.ticker.as_str())
            .collect()
    }

    pub fn pair(&self, a: &str, b: &str) -> Option<&PairComparison> {
        self.pairs.iter().find(|p| p.a == a && p.b == b)
    }

    pub fn event(&self, event_id: &str) -> Option<&EventComparison> {
        self.events.iter().find(|e| e.event_id == event_id)
    }

    /// Average returns, CARs and winners over the given events
    pub fn aggregate(&self, event_ids: &[&str]) -> Option<EventAggregate> {
        let events: Vec<_> = self
            .events
            .iter()
            .filter(|e| event_ids.contains(&e.event_id.as_str()))
            .collect();
        if events.is_empty() {
            return None;
        }

        let mut average_window_return = BTreeMap::new();
        let mut average_car = BTreeMap::new();
        for ticker in &self.tickers {
            let results: Vec<_> = events.iter().filter_map(|e| e.result(ticker)).collect();
            if results.is_empty() {
                continue;
            }
            let n = results.len() as f64;
            average_window_return.insert(
                ticker.clone(),
                results.iter().map(|r| r.window_return).sum::<f64>() / n,
            );
            average_car.insert(ticker.clone(), results.iter().map(|r| r.car).sum::<f64>() / n);
        }

        let mut wins = BTreeMap::new();
        for winner in events.iter().filter_map(|e| e.winner.as_ref()) {
            *wins.entry(winner.clone()).or_insert(0) += 1;
        }

        Some(EventAggregate {
            events: events.len(),
            average_window_return,
            average_car,
            wins,
        })
    }
}

/// Runs event studies and relative-performance metrics across tickers.
///
/// One ticker failing never aborts the comparison; only a missing benchmark
/// does, since nothing can be market-adjusted without it.
#[derive(Debug, Clone)]
pub struct EcosystemComparator {
    engine: Arc<EventStudyEngine>,
}

impl EcosystemComparator {
    pub fn new(engine: Arc<EventStudyEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<EventStudyEngine> {
        &self.engine
    }

    pub async fn compare(&self, request: &ComparisonRequest) -> Result<ComparisonReport> {
        request.validate()?;
        let end = request.end.unwrap_or_else(|| Utc::now().date_naive());
        let (fetch_start, fetch_end) = if request.events.is_empty() {
            (request.start, end)
        } else {
            let (lo, hi) = fetch_range(&request.events, &request.window);
            (lo.min(request.start), hi.max(end))
        };

        let benchmark_fetch = self.engine.fetch_returns(&request.benchmark, fetch_start, fetch_end);
        let ticker_fetches = join_all(
            request
                .tickers
                .iter()
                .map(|t| self.engine.fetch_returns(t, fetch_start, fetch_end)),
        );
        let (benchmark, fetched) = tokio::join!(benchmark_fetch, ticker_fetches);
        let benchmark = benchmark?;

        let mut failures = Vec::new();
        let mut series: Vec<ReturnSeries> = Vec::new();
        for (ticker, result) in request.tickers.iter().zip(fetched) {
            match result {
                Ok(s) if !s.is_empty() => series.push(s),
                Ok(_) => failures.push(TickerFailure {
                    ticker: ticker.clone(),
                    stage: FailureStage::Fetch,
                    event_id: None,
                    reason: "empty return series".to_string(),
                }),
                Err(e) => failures.push(TickerFailure {
                    ticker: ticker.clone(),
                    stage: FailureStage::Fetch,
                    event_id: None,
                    reason: e.to_string(),
                }),
            }
        }

        let period_benchmark = benchmark.slice(request.start, end);
        let summaries = series
            .iter()
            .map(|s| summarize(&s.slice(request.start, end), &period_benchmark))
            .collect();

        let mut events: Vec<EventComparison> = request
            .events
            .iter()
            .map(|e| EventComparison {
                event_id: e.id.clone(),
                title: e.title.clone(),
                date: e.date,
                benchmark_return: None,
                results: Vec::new(),
                winner: None,
            })
            .collect();

        // Raw returns per (ticker, event) for the win counts.
        let mut raw: BTreeMap<(String, String), f64> = BTreeMap::new();
        let mut cars: BTreeMap<(String, String), f64> = BTreeMap::new();

        for s in &series {
            let ticker = s.ticker().to_string();
            let batch = self
                .engine
                .study_aligned(&align(s, &benchmark), &request.events, &request.window)
                .await;

            for failure in batch.failures {
                failures.push(TickerFailure {
                    ticker: ticker.clone(),
                    stage: FailureStage::Study,
                    event_id: Some(failure.event_id),
                    reason: failure.reason,
                });
            }

            for car in batch.results {
                let Some(comparison) = events.iter_mut().find(|e| e.event_id == car.event_id) else {
                    continue;
                };
                let window_return = compound_after_first(&car.abnormal_returns.iter().map(|a| a.actual).collect::<Vec<_>>());
                let benchmark_window = benchmark.slice(car.window_start, car.window_end);
                let benchmark_return = compound_after_first(benchmark_window.values());
                comparison.benchmark_return.get_or_insert(benchmark_return);

                raw.insert((ticker.clone(), car.event_id.clone()), car.raw_return);
                cars.insert((ticker.clone(), car.event_id.clone()), car.car);
                comparison.results.push(TickerEventResult {
                    ticker: ticker.clone(),
                    car: car.car,
                    t_statistic: car.t_statistic,
                    p_value: car.p_value,
                    significant: car.significant,
                    raw_return: car.raw_return,
                    window_return,
                    alpha: window_return - benchmark_return,
                });
            }
        }

        for comparison in &mut events {
            comparison.winner = winner(&comparison.results);
        }
        events.retain(|e| !e.results.is_empty());

        let tickers: Vec<String> = series.iter().map(|s| s.ticker().to_string()).collect();
        let mut pairs = Vec::new();
        for (i, a) in series.iter().enumerate() {
            for b in &series[i + 1..] {
                pairs.push(compare_pair(
                    a,
                    b,
                    &request.events,
                    &raw,
                    &cars,
                    request.correlation_window,
                    request.start,
                    end,
                ));
            }
        }

        if failures.is_empty() {
            info!(tickers = tickers.len(), events = events.len(), "comparison complete");
        } else {
            warn!(
                tickers = tickers.len(),
                failures = failures.len(),
                "comparison completed with failures"
            );
        }

        Ok(ComparisonReport {
            benchmark: request.benchmark.clone(),
            start: request.start,
            end,
            tickers,
            summaries,
            events,
            pairs,
            failures,
        })
    }
}

fn summarize(subject: &ReturnSeries, benchmark: &ReturnSeries) -> TickerSummary {
    let ticker = subject.ticker();
    let aligned = align(subject, benchmark);
    TickerSummary {
        ticker: ticker.to_string(),
        name: universe::display_name(ticker),
        group: universe::group_of(ticker),
        export_exposure: universe::export_exposure(ticker),
        trading_days: subject.len(),
        cumulative_return: stats::compound(subject.values()),
        annualized_volatility: stats::annualized_volatility(subject.values()),
        beta: stats::beta(&aligned.subject, &aligned.benchmark),
        correlation: stats::correlation(&aligned.subject, &aligned.benchmark),
    }
}

/// Price change from the first to the last day of a window
fn compound_after_first(daily: &[f64]) -> f64 {
    daily.get(1..).map_or(0.0, stats::compound)
}

fn winner(results: &[TickerEventResult]) -> Option<String> {
    let mut best: Option<&TickerEventResult> = None;
    for r in results {
        if best.is_none_or(|b| r.window_return > b.window_return) {
            best = Some(r);
        }
    }
    best.map(|r| r.ticker.clone())
}

#[allow(clippy::too_many_arguments)]
fn compare_pair(
    a: &ReturnSeries,
    b: &ReturnSeries,
    events: &[EventSpec],
    raw: &BTreeMap<(String, String), f64>,
    cars: &BTreeMap<(String, String), f64>,
    correlation_window: usize,
    start: NaiveDate,
    end: NaiveDate,
) -> PairComparison {
    let (ta, tb) = (a.ticker().to_string(), b.ticker().to_string());
    let mut pair = PairComparison {
        a: ta.clone(),
        b: tb.clone(),
        spreads: Vec::new(),
        mean_spread: None,
        a_wins: 0,
        b_wins: 0,
        ties: 0,
        rolling_correlation: None,
    };

    for event in events {
        let key_a = (ta.clone(), event.id.clone());
        let key_b = (tb.clone(), event.id.clone());
        if let (Some(car_a), Some(car_b)) = (cars.get(&key_a), cars.get(&key_b)) {
            pair.spreads.push(CarSpread {
                event_id: event.id.clone(),
                spread: car_a - car_b,
            });
        }
        if let (Some(raw_a), Some(raw_b)) = (raw.get(&key_a), raw.get(&key_b)) {
            match raw_a.partial_cmp(raw_b) {
                Some(std::cmp::Ordering::Greater) => pair.a_wins += 1,
                Some(std::cmp::Ordering::Less) => pair.b_wins += 1,
                _ => pair.ties += 1,
            }
        }
    }

    let spreads: Vec<f64> = pair.spreads.iter().map(|s| s.spread).collect();
    pair.mean_spread = stats::mean(&spreads);

    let aligned = align(&a.slice(start, end), &b.slice(start, end));
    let rolling: Vec<f64> = stats::rolling_correlation(&aligned.subject, &aligned.benchmark, correlation_window)
        .into_iter()
        .flatten()
        .collect();
    if let Some(&latest) = rolling.last() {
        pair.rolling_correlation = Some(CorrelationSummary {
            window: correlation_window,
            latest,
            mean: stats::mean(&rolling).unwrap_or(latest),
            min: rolling.iter().copied().fold(f64::INFINITY, f64::min),
            max: rolling.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            points: rolling.len(),
        });
    }

    pair
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CarCache;
    use crate::config::ymd;
    use crate::error::DataError;
    use crate::loader::{MockMarketDataLoader, StaticLoader};
    use crate::testing::{benchmark, follower, weekdays};

    fn universe() -> StaticLoader {
        let dates = weekdays(ymd(2022, 1, 3), 500);
        let spy = benchmark("SPY", &dates, 7);
        let nvda = follower("NVDA", &spy, 0.001, 1.7, 11);
        let amd = follower("AMD", &spy, 0.0, 1.4, 12);
        StaticLoader::new().with_returns(spy).with_returns(nvda).with_returns(amd)
    }

    fn events() -> Vec<EventSpec> {
        vec![
            EventSpec::new("2022-10-07", ymd(2022, 10, 7), "October 7 rules"),
            EventSpec::new("2023-05-24", ymd(2023, 5, 24), "Earnings"),
        ]
    }

    fn comparator(loader: impl crate::loader::MarketDataLoader + 'static) -> EcosystemComparator {
        EcosystemComparator::new(Arc::new(EventStudyEngine::new(
            Arc::new(loader),
            CarCache::default(),
        )))
    }

    fn request(tickers: &[&str]) -> ComparisonRequest {
        ComparisonRequest::new(tickers.iter().copied(), ymd(2022, 6, 1))
            .with_end(ymd(2023, 12, 1))
            .with_events(events())
    }

    #[tokio::test]
    async fn test_missing_ticker_is_partial() {
        let report = comparator(universe())
            .compare(&request(&["NVDA", "INTC", "AMD"]))
            .await
            .unwrap();

        assert_eq!(report.tickers, vec!["NVDA", "AMD"]);
        assert!(report.is_partial());
        assert_eq!(report.failed_tickers(), vec!["INTC"]);
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.events.len(), 2);
        for event in &report.events {
            assert_eq!(event.results.len(), 2);
            assert!(event.winner.is_some());
        }
        assert_eq!(report.pairs.len(), 1);
    }

    #[tokio::test]
    async fn test_pair_metrics() {
        let report = comparator(universe())
            .compare(&request(&["NVDA", "AMD"]))
            .await
            .unwrap();
        let pair = report.pair("NVDA", "AMD").unwrap();

        assert_eq!(pair.spreads.len(), 2);
        assert_eq!(pair.a_wins + pair.b_wins + pair.ties, 2);
        let expected: f64 = report
            .events
            .iter()
            .map(|e| e.result("NVDA").unwrap().car - e.result("AMD").unwrap().car)
            .sum::<f64>()
            / 2.0;
        assert!((pair.mean_spread.unwrap() - expected).abs() < 1e-12);

        let corr = pair.rolling_correlation.as_ref().unwrap();
        assert_eq!(corr.window, 30);
        // Both follow the same benchmark with small idiosyncratic noise.
        assert!(corr.mean > 0.5);
        assert!(corr.min <= corr.latest && corr.latest <= corr.max);
    }

    #[tokio::test]
    async fn test_summaries_and_alpha() {
        let report = comparator(universe())
            .compare(&request(&["NVDA"]))
            .await
            .unwrap();
        let summary = &report.summaries[0];
        assert_eq!(summary.name, Some("Nvidia"));
        assert_eq!(summary.group, Some("gpu_leaders"));
        assert!((summary.beta.unwrap() - 1.7).abs() < 0.2);
        assert!(summary.correlation.unwrap() > 0.8);

        let event = report.event("2022-10-07").unwrap();
        let nvda = event.result("NVDA").unwrap();
        let benchmark_return = event.benchmark_return.unwrap();
        assert!((nvda.alpha - (nvda.window_return - benchmark_return)).abs() < 1e-15);
        assert_eq!(event.winner.as_deref(), Some("NVDA"));
    }

    #[tokio::test]
    async fn test_benchmark_failure_is_fatal() {
        let mut mock = MockMarketDataLoader::new();
        mock.expect_get_returns().returning(|ticker, _, _| {
            if ticker == "SPY" {
                Err(DataError::RateLimited {
                    provider: "yahoo".to_string(),
                })
            } else {
                Err(DataError::unavailable(ticker, "not used"))
            }
        });

        let err = comparator(mock)
            .compare(&request(&["NVDA", "AMD"]))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Data(DataError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_study_failures_are_reported_per_event() {
        let report = comparator(universe())
            .compare(&request(&["NVDA"]).with_events(vec![
                EventSpec::new("early", ymd(2022, 1, 10), "too early"),
                EventSpec::new("2022-10-07", ymd(2022, 10, 7), "October 7 rules"),
            ]))
            .await
            .unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, FailureStage::Study);
        assert_eq!(report.failures[0].event_id.as_deref(), Some("early"));
        assert!(report.failed_tickers().is_empty());
    }

    #[test]
    fn test_ties_go_to_first_ticker() {
        let result = |ticker: &str, window_return: f64| TickerEventResult {
            ticker: ticker.to_string(),
            car: 0.0,
            t_statistic: 0.0,
            p_value: 1.0,
            significant: false,
            raw_return: 0.0,
            window_return,
            alpha: 0.0,
        };
        let results = vec![result("AMD", 0.02), result("NVDA", 0.02), result("INTC", -0.01)];
        assert_eq!(winner(&results).as_deref(), Some("AMD"));
        assert_eq!(winner(&[]), None);
    }

    #[test]
    fn test_request_validation() {
        let request = ComparisonRequest::new(["nvda", " NVDA ", "amd"], ymd(2023, 1, 1));
        assert_eq!(request.tickers, vec!["NVDA", "AMD"]);
        assert!(request.validate().is_ok());

        let empty: [&str; 0] = [];
        assert!(ComparisonRequest::new(empty, ymd(2023, 1, 1)).validate().is_err());
        assert!(
            ComparisonRequest::new(["NVDA"], ymd(2023, 1, 1))
                .with_end(ymd(2022, 1, 1))
                .validate()
                .is_err()
        );
    }
}
