//! Error types for market data and event-study computations

use chrono::NaiveDate;
use thiserror::Error;

/// Upstream data failures. Never papered over with stale or synthetic data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    /// The series could not be fetched (network failure, unknown symbol,
    /// empty response, timeout)
    #[error("data unavailable for {ticker}: {reason}")]
    Unavailable { ticker: String, reason: String },

    /// The provider throttled us
    #[error("rate limit exceeded for {provider}")]
    RateLimited { provider: String },

    /// The provider returned data violating series invariants
    #[error("malformed series for {ticker}: {reason}")]
    Malformed { ticker: String, reason: String },
}

impl DataError {
    pub fn unavailable(ticker: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            ticker: ticker.into(),
            reason: reason.to_string(),
        }
    }
}

/// Statistical failures. Each aborts one computation and is not retried:
/// only different parameters can fix them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StudyError {
    #[error("insufficient data for {ticker} in {window}: need {needed} points, have {available}")]
    InsufficientData {
        ticker: String,
        window: &'static str,
        needed: usize,
        available: usize,
    },

    /// Benchmark returns have (numerically) zero variance
    #[error("degenerate regression for {ticker}: benchmark variance {variance:e} in estimation window")]
    DegenerateRegression { ticker: String, variance: f64 },

    /// No trading day within the snap tolerance at or after the date
    #[error("cannot resolve {date} to a trading day for {ticker} within {tolerance_days} calendar days")]
    EventDateUnresolved {
        ticker: String,
        date: NaiveDate,
        tolerance_days: u32,
    },

    #[error("estimation window ends at day {estimation_end} but event window starts at day {event_start}")]
    OverlappingWindow { estimation_end: i64, event_start: i64 },

    #[error("invalid window configuration: {0}")]
    InvalidWindow(String),

    #[error("series length mismatch for {ticker}: subject has {subject} points, benchmark {benchmark}")]
    MisalignedSeries {
        ticker: String,
        subject: usize,
        benchmark: usize,
    },
}

/// Crate-level error
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MarketError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Study(#[from] StudyError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = StudyError::InsufficientData {
            ticker: "NVDA".into(),
            window: "estimation window",
            needed: 30,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for NVDA in estimation window: need 30 points, have 12"
        );

        let err: MarketError = DataError::unavailable("AMD", "HTTP 503").into();
        assert_eq!(err.to_string(), "data unavailable for AMD: HTTP 503");
        assert!(matches!(err, MarketError::Data(_)));
    }

    #[test]
    fn test_study_error_converts() {
        let err: MarketError = StudyError::OverlappingWindow {
            estimation_end: -1,
            event_start: -1,
        }
        .into();
        assert!(matches!(
            err,
            MarketError::Study(StudyError::OverlappingWindow { .. })
        ));
    }
}
