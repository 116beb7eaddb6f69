//! Cumulative abnormal return for one event

use crate::config::WindowConfig;
use crate::error::StudyError;
use crate::market_model::{self, MarketModelParameters};
use crate::series::{AlignedReturns, ReturnSeries, align, snap_forward};
use crate::stats;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Significance threshold for the two-tailed test
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// The event being studied
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventSpec {
    pub id: String,
    pub date: NaiveDate,
    pub title: String,
}

impl EventSpec {
    pub fn new(id: impl Into<String>, date: NaiveDate, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date,
            title: title.into(),
        }
    }
}

/// Actual minus predicted return on one event-window day
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AbnormalReturn {
    pub date: NaiveDate,
    /// Trading-day offset from the resolved event day
    pub offset: i64,
    pub actual: f64,
    pub expected: f64,
    pub abnormal: f64,
}

/// Result of one event study. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarEvent {
    pub event_id: String,
    pub event_title: String,
    pub ticker: String,
    pub benchmark: String,
    /// Date as requested
    pub event_date: NaiveDate,
    /// Trading day the event date snapped to
    pub resolved_date: NaiveDate,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub car: f64,
    /// Sum of unadjusted subject returns over the event window
    pub raw_return: f64,
    /// Sum of benchmark returns over the event window
    pub benchmark_return: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    pub estimation_days: usize,
    pub degrees_of_freedom: usize,
    pub model: MarketModelParameters,
    pub abnormal_returns: Vec<AbnormalReturn>,
}

/// Compute the CAR of `subject` around `event`.
///
/// Pure: no I/O, no caching, deterministic for identical inputs.
pub fn compute_car(
    subject: &ReturnSeries,
    benchmark: &ReturnSeries,
    event: &EventSpec,
    window: &WindowConfig,
) -> Result<CarEvent, StudyError> {
    window.validate()?;
    compute_car_aligned(&align(subject, benchmark), event, window)
}

/// [`compute_car`] over series that were already aligned.
pub fn compute_car_aligned(
    data: &AlignedReturns,
    event: &EventSpec,
    window: &WindowConfig,
) -> Result<CarEvent, StudyError> {
    window.validate()?;
    let ticker = data.subject_ticker.as_str();
    let insufficient = |window_name: &'static str, needed: usize, available: usize| {
        StudyError::InsufficientData {
            ticker: ticker.to_string(),
            window: window_name,
            needed,
            available,
        }
    };

    let event_idx = snap_forward(&data.dates, event.date, window.snap_tolerance_days).ok_or_else(
        || StudyError::EventDateUnresolved {
            ticker: ticker.to_string(),
            date: event.date,
            tolerance_days: window.snap_tolerance_days,
        },
    )? as i64;

    let n = data.len() as i64;
    let start = event_idx + window.event_start;
    let end = event_idx + window.event_end;
    if start < 0 {
        return Err(insufficient(
            "event window",
            window.event_window_len(),
            usize::try_from(end + 1).unwrap_or(0),
        ));
    }
    if end >= n {
        return Err(insufficient(
            "event window",
            window.event_window_len(),
            usize::try_from(n - start).unwrap_or(0),
        ));
    }

    let est_end = event_idx + window.estimation_end();
    let est_start = (est_end - window.estimation_length as i64 + 1).max(0);
    let available = usize::try_from(est_end - est_start + 1).unwrap_or(0);
    if est_end < 0 || available < window.min_estimation_points {
        return Err(insufficient(
            "estimation window",
            window.min_estimation_points,
            if est_end < 0 { 0 } else { available },
        ));
    }

    // Both ranges are in bounds and non-negative past the checks above.
    let (est_start, est_end) = (est_start as usize, est_end as usize);
    let (start, end) = (start as usize, end as usize);

    let model = market_model::fit(
        ticker,
        &data.subject[est_start..=est_end],
        &data.benchmark[est_start..=est_end],
        window.min_estimation_points,
    )?;

    let abnormal_returns: Vec<AbnormalReturn> = (start..=end)
        .map(|i| {
            let actual = data.subject[i];
            let expected = model.predict(data.benchmark[i]);
            AbnormalReturn {
                date: data.dates[i],
                offset: i as i64 - event_idx,
                actual,
                expected,
                abnormal: actual - expected,
            }
        })
        .collect();

    let car: f64 = abnormal_returns.iter().map(|a| a.abnormal).sum();
    let raw_return: f64 = data.subject[start..=end].iter().sum();
    let benchmark_return: f64 = data.benchmark[start..=end].iter().sum();

    let standard_error = model.residual_std_dev * (abnormal_returns.len() as f64).sqrt();
    let t_statistic = if standard_error > 0.0 {
        car / standard_error
    } else {
        0.0
    };
    let degrees_of_freedom = model.observations - 1;
    let p_value = stats::two_tailed_p_value(t_statistic, degrees_of_freedom as f64).unwrap_or(1.0);

    Ok(CarEvent {
        event_id: event.id.clone(),
        event_title: event.title.clone(),
        ticker: ticker.to_string(),
        benchmark: data.benchmark_ticker.clone(),
        event_date: event.date,
        resolved_date: data.dates[event_idx as usize],
        window_start: data.dates[start],
        window_end: data.dates[end],
        car,
        raw_return,
        benchmark_return,
        t_statistic,
        p_value,
        significant: p_value < SIGNIFICANCE_LEVEL,
        estimation_days: model.observations,
        degrees_of_freedom,
        model,
        abnormal_returns,
    })
}

/// Aggregate view over several CARs for one ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarSummary {
    pub events: usize,
    pub average_car: f64,
    pub significant: usize,
    pub best_event: String,
    pub best_car: f64,
    pub worst_event: String,
    pub worst_car: f64,
}

impl CarSummary {
    /// `None` for an empty slice
    pub fn from_results(results: &[CarEvent]) -> Option<Self> {
        let first = results.first()?;
        let mut best = first;
        let mut worst = first;
        for r in &results[1..] {
            if r.car > best.car {
                best = r;
            }
            if r.car < worst.car {
                worst = r;
            }
        }

        Some(Self {
            events: results.len(),
            average_car: results.iter().map(|r| r.car).sum::<f64>() / results.len() as f64,
            significant: results.iter().filter(|r| r.significant).count(),
            best_event: best.event_id.clone(),
            best_car: best.car,
            worst_event: worst.event_id.clone(),
            worst_car: worst.car,
        })
    }
}
