//! Configuration for event studies and market data access

use crate::error::{MarketError, Result, StudyError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest accepted distance of any window boundary from the event day, in trading days
pub const MAX_WINDOW_OFFSET: i64 = 250;

/// Longest accepted estimation window, in trading days
pub const MAX_ESTIMATION_LENGTH: usize = 1000;

/// Event-study window layout, in trading days relative to the event day.
///
/// Part of the CAR cache key, hence `Hash + Eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Trading days in the estimation window
    pub estimation_length: usize,
    /// First event-window day (e.g. -1)
    pub event_start: i64,
    /// Last event-window day (e.g. +5)
    pub event_end: i64,
    /// Last estimation-window day; defaults to `event_start - 1`
    pub estimation_end_offset: Option<i64>,
    /// Fewest estimation points accepted when history is short
    pub min_estimation_points: usize,
    /// How far forward (calendar days) an event date may snap to a trading day
    pub snap_tolerance_days: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            estimation_length: 120,
            event_start: -1,
            event_end: 5,
            estimation_end_offset: None,
            min_estimation_points: 30,
            snap_tolerance_days: 5,
        }
    }
}

impl WindowConfig {
    /// Same layout with a different event window
    pub fn with_event_window(mut self, start: i64, end: i64) -> Self {
        self.event_start = start;
        self.event_end = end;
        self
    }

    /// Same layout with a different estimation length
    pub fn with_estimation_length(mut self, length: usize) -> Self {
        self.estimation_length = length;
        self
    }

    /// Pin the last estimation day explicitly
    pub fn with_estimation_end(mut self, offset: i64) -> Self {
        self.estimation_end_offset = Some(offset);
        self
    }

    /// Last estimation-window day relative to the event
    pub fn estimation_end(&self) -> i64 {
        self.estimation_end_offset
            .unwrap_or(self.event_start.saturating_sub(1))
    }

    /// Number of trading days in the event window
    pub fn event_window_len(&self) -> usize {
        usize::try_from(
            self.event_end
                .saturating_sub(self.event_start)
                .saturating_add(1),
        )
        .unwrap_or(0)
    }

    /// Reject layouts that cannot produce a valid study.
    ///
    /// Runs before any data is touched.
    pub fn validate(&self) -> std::result::Result<(), StudyError> {
        let offsets = [
            ("event window start", Some(self.event_start)),
            ("event window end", Some(self.event_end)),
            ("estimation window end", self.estimation_end_offset),
        ];
        for (name, offset) in offsets {
            if let Some(offset) = offset.filter(|o| o.unsigned_abs() > MAX_WINDOW_OFFSET.unsigned_abs()) {
                return Err(StudyError::InvalidWindow(format!(
                    "{name} {offset} is more than {MAX_WINDOW_OFFSET} trading days from the event"
                )));
            }
        }
        if self.estimation_length > MAX_ESTIMATION_LENGTH {
            return Err(StudyError::InvalidWindow(format!(
                "estimation_length {} exceeds {MAX_ESTIMATION_LENGTH}",
                self.estimation_length
            )));
        }
        if self.event_start > self.event_end {
            return Err(StudyError::InvalidWindow(format!(
                "event window start {} is after end {}",
                self.event_start, self.event_end
            )));
        }
        if self.min_estimation_points < 3 {
            return Err(StudyError::InvalidWindow(
                "min_estimation_points must be at least 3".to_string(),
            ));
        }
        if self.estimation_length < self.min_estimation_points {
            return Err(StudyError::InvalidWindow(format!(
                "estimation_length {} is below min_estimation_points {}",
                self.estimation_length, self.min_estimation_points
            )));
        }
        let estimation_end = self.estimation_end();
        if estimation_end >= self.event_start {
            return Err(StudyError::OverlappingWindow {
                estimation_end,
                event_start: self.event_start,
            });
        }
        Ok(())
    }

    /// Calendar days of history to request before the earliest event
    pub fn lookback_days(&self) -> i64 {
        let trading = i64::try_from(self.estimation_length)
            .unwrap_or(i64::MAX)
            .saturating_sub(self.estimation_end().min(0));
        (trading.saturating_mul(8) / 5).saturating_add(10)
    }

    /// Calendar days of data to request after the latest event
    pub fn lookahead_days(&self) -> i64 {
        (self.event_end.max(0).saturating_mul(8) / 5)
            .saturating_add(10 + i64::from(self.snap_tolerance_days))
    }
}

pub(crate) fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Configuration for market data access and analysis defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Benchmark ticker used when a request names none
    pub benchmark: String,
    /// Start of the analysis period when a request names none
    pub start_date: NaiveDate,
    /// Default event-study window layout
    pub window: WindowConfig,
    /// Trading days in each rolling-correlation window
    pub correlation_window: usize,
    /// How long computed CARs stay cached
    pub cache_ttl: Duration,
    /// Timeout for a single series fetch
    pub request_timeout: Duration,
    /// Loader rate limit
    pub requests_per_second: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            benchmark: "SPY".to_string(),
            start_date: ymd(2022, 1, 1),
            window: WindowConfig::default(),
            correlation_window: 30,
            cache_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(30),
            requests_per_second: 4,
        }
    }
}

impl MarketConfig {
    /// Create a new configuration builder
    pub fn builder() -> MarketConfigBuilder {
        MarketConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.benchmark.trim().is_empty() {
            return Err(MarketError::Config("benchmark must not be empty".to_string()));
        }
        if self.correlation_window < 2 {
            return Err(MarketError::Config(
                "correlation_window must be at least 2".to_string(),
            ));
        }
        if self.requests_per_second == 0 {
            return Err(MarketError::Config(
                "requests_per_second must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(MarketError::Config(
                "request_timeout must be greater than 0".to_string(),
            ));
        }
        self.window.validate().map_err(|e| MarketError::Config(e.to_string()))
    }
}

/// Builder for [`MarketConfig`]
#[derive(Debug, Default)]
pub struct MarketConfigBuilder {
    benchmark: Option<String>,
    start_date: Option<NaiveDate>,
    window: Option<WindowConfig>,
    correlation_window: Option<usize>,
    cache_ttl: Option<Duration>,
    request_timeout: Option<Duration>,
    requests_per_second: Option<u32>,
}

impl MarketConfigBuilder {
    pub fn benchmark(mut self, ticker: impl Into<String>) -> Self {
        self.benchmark = Some(ticker.into());
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn window(mut self, window: WindowConfig) -> Self {
        self.window = Some(window);
        self
    }

    pub fn correlation_window(mut self, days: usize) -> Self {
        self.correlation_window = Some(days);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = Some(rps);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<MarketConfig> {
        let defaults = MarketConfig::default();
        let config = MarketConfig {
            benchmark: self
                .benchmark
                .map_or(defaults.benchmark, |b| b.trim().to_uppercase()),
            start_date: self.start_date.unwrap_or(defaults.start_date),
            window: self.window.unwrap_or(defaults.window),
            correlation_window: self.correlation_window.unwrap_or(defaults.correlation_window),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            requests_per_second: self
                .requests_per_second
                .unwrap_or(defaults.requests_per_second),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window() {
        let window = WindowConfig::default();
        assert_eq!(window.estimation_end(), -2);
        assert_eq!(window.event_window_len(), 7);
        assert!(window.validate().is_ok());
    }

    #[test]
    fn test_overlapping_window_rejected() {
        let window = WindowConfig::default().with_estimation_end(-1);
        assert_eq!(
            window.validate(),
            Err(StudyError::OverlappingWindow {
                estimation_end: -1,
                event_start: -1
            })
        );

        let window = WindowConfig::default().with_event_window(-5, 5).with_estimation_end(-3);
        assert!(matches!(
            window.validate(),
            Err(StudyError::OverlappingWindow { .. })
        ));
    }

    #[test]
    fn test_invalid_windows() {
        assert!(matches!(
            WindowConfig::default().with_event_window(3, 1).validate(),
            Err(StudyError::InvalidWindow(_))
        ));
        assert!(matches!(
            WindowConfig::default().with_estimation_length(10).validate(),
            Err(StudyError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_extreme_offsets_rejected() {
        let extremes = [
            WindowConfig::default().with_event_window(-1, 2_000_000_000_000_000_000),
            WindowConfig::default().with_event_window(i64::MIN, 5),
            WindowConfig::default().with_event_window(i64::MIN, i64::MAX),
            WindowConfig::default().with_event_window(-1, MAX_WINDOW_OFFSET + 1),
            WindowConfig::default().with_estimation_end(i64::MIN),
            WindowConfig::default().with_estimation_length(usize::MAX),
        ];
        for window in extremes {
            assert!(
                matches!(window.validate(), Err(StudyError::InvalidWindow(_))),
                "{window:?} accepted"
            );
        }

        let widest = WindowConfig::default()
            .with_event_window(-MAX_WINDOW_OFFSET + 1, MAX_WINDOW_OFFSET)
            .with_estimation_end(-MAX_WINDOW_OFFSET);
        assert!(widest.validate().is_ok());
    }

    #[test]
    fn test_window_arithmetic_saturates() {
        let window = WindowConfig::default().with_event_window(i64::MIN, i64::MAX);
        assert_eq!(window.estimation_end(), i64::MIN);
        assert_eq!(window.event_window_len(), usize::try_from(i64::MAX).unwrap());
        assert!(window.lookahead_days() > 0);
        assert!(window.lookback_days() > 0);
    }

    #[test]
    fn test_lookback_covers_estimation() {
        let window = WindowConfig::default();
        // 122 trading days need roughly 171 calendar days
        assert!(window.lookback_days() >= 171);
        assert!(window.lookahead_days() >= 7 + 5);
    }

    #[test]
    fn test_builder_defaults() {
        let config = MarketConfig::builder().build().unwrap();
        assert_eq!(config.benchmark, "SPY");
        assert_eq!(config.start_date, ymd(2022, 1, 1));
        assert_eq!(config.correlation_window, 30);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn test_builder_validation() {
        let config = MarketConfig::builder()
            .benchmark(" smh ")
            .correlation_window(60)
            .requests_per_second(2)
            .build()
            .unwrap();
        assert_eq!(config.benchmark, "SMH");

        assert!(MarketConfig::builder().requests_per_second(0).build().is_err());
        assert!(MarketConfig::builder().correlation_window(1).build().is_err());
        assert!(
            MarketConfig::builder()
                .window(WindowConfig::default().with_estimation_end(0))
                .build()
                .is_err()
        );
    }
}
