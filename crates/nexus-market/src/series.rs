//! Price and return series
//!
//! Both types are validated on construction (strictly increasing dates,
//! finite values) and immutable afterwards.

use crate::error::DataError;
use chrono::NaiveDate;
use serde::Serialize;

fn check_dates(ticker: &str, dates: &[NaiveDate]) -> Result<(), DataError> {
    if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(DataError::Malformed {
            ticker: ticker.to_string(),
            reason: format!("dates not strictly increasing at {} -> {}", pair[0], pair[1]),
        });
    }
    Ok(())
}

/// Daily adjusted closes for one ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    ticker: String,
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Build a series; prices must be positive and finite
    pub fn new(ticker: impl Into<String>, points: Vec<(NaiveDate, f64)>) -> Result<Self, DataError> {
        let ticker = ticker.into();
        let (dates, closes): (Vec<_>, Vec<_>) = points.into_iter().unzip();
        check_dates(&ticker, &dates)?;
        if let Some((date, close)) = dates
            .iter()
            .zip(&closes)
            .find(|(_, c)| !c.is_finite() || **c <= 0.0)
        {
            return Err(DataError::Malformed {
                ticker,
                reason: format!("non-positive close {close} on {date}"),
            });
        }
        Ok(Self {
            ticker,
            dates,
            closes,
        })
    }

    /// Rebuild prices from a return series, starting at `base` the day before
    /// the first return
    pub fn from_returns(returns: &ReturnSeries, base: f64) -> Result<Self, DataError> {
        let mut price = base;
        let points = returns
            .dates()
            .iter()
            .zip(returns.values())
            .map(|(d, r)| {
                price *= 1.0 + r;
                (*d, price)
            })
            .collect();
        Self::new(returns.ticker(), points)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Most recent (date, close)
    pub fn latest(&self) -> Option<(NaiveDate, f64)> {
        Some((*self.dates.last()?, *self.closes.last()?))
    }

    /// Points with `start <= date <= end`
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end).max(lo);
        Self {
            ticker: self.ticker.clone(),
            dates: self.dates[lo..hi].to_vec(),
            closes: self.closes[lo..hi].to_vec(),
        }
    }

    /// Simple daily returns, dated by the later close
    pub fn returns(&self) -> ReturnSeries {
        let (dates, values) = self
            .dates
            .iter()
            .skip(1)
            .zip(self.closes.windows(2))
            .map(|(d, w)| (*d, w[1] / w[0] - 1.0))
            .unzip();
        ReturnSeries {
            ticker: self.ticker.clone(),
            dates,
            values,
        }
    }

    /// Last close over first close, minus one
    pub fn cumulative_return(&self) -> Option<f64> {
        Some(self.closes.last()? / self.closes.first()? - 1.0)
    }

    /// Largest peak-to-trough decline, as a non-positive fraction
    pub fn max_drawdown(&self) -> Option<f64> {
        let mut peak = *self.closes.first()?;
        let mut worst = 0.0_f64;
        for close in &self.closes {
            peak = peak.max(*close);
            worst = worst.min(close / peak - 1.0);
        }
        Some(worst)
    }
}

/// Daily simple returns for one ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnSeries {
    ticker: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl ReturnSeries {
    /// Build a series; returns must be finite and greater than -100%
    pub fn new(ticker: impl Into<String>, points: Vec<(NaiveDate, f64)>) -> Result<Self, DataError> {
        let ticker = ticker.into();
        let (dates, values): (Vec<_>, Vec<_>) = points.into_iter().unzip();
        check_dates(&ticker, &dates)?;
        if let Some((date, value)) = dates
            .iter()
            .zip(&values)
            .find(|(_, v)| !v.is_finite() || **v <= -1.0)
        {
            return Err(DataError::Malformed {
                ticker,
                reason: format!("invalid return {value} on {date}"),
            });
        }
        Ok(Self {
            ticker,
            dates,
            values,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Return on an exact date
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.values[i])
    }

    /// Points with `start <= date <= end`
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end).max(lo);
        Self {
            ticker: self.ticker.clone(),
            dates: self.dates[lo..hi].to_vec(),
            values: self.values[lo..hi].to_vec(),
        }
    }
}

/// Two return series restricted to their common dates
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedReturns {
    pub subject_ticker: String,
    pub benchmark_ticker: String,
    pub dates: Vec<NaiveDate>,
    pub subject: Vec<f64>,
    pub benchmark: Vec<f64>,
}

impl AlignedReturns {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Inner join of two series on date
pub fn align(subject: &ReturnSeries, benchmark: &ReturnSeries) -> AlignedReturns {
    let mut aligned = AlignedReturns {
        subject_ticker: subject.ticker.clone(),
        benchmark_ticker: benchmark.ticker.clone(),
        dates: Vec::new(),
        subject: Vec::new(),
        benchmark: Vec::new(),
    };

    let (mut i, mut j) = (0, 0);
    while i < subject.len() && j < benchmark.len() {
        match subject.dates[i].cmp(&benchmark.dates[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                aligned.dates.push(subject.dates[i]);
                aligned.subject.push(subject.values[i]);
                aligned.benchmark.push(benchmark.values[j]);
                i += 1;
                j += 1;
            }
        }
    }

    aligned
}

/// Index of the first date at or after `date`, if it lies within
/// `tolerance_days` calendar days
pub fn snap_forward(dates: &[NaiveDate], date: NaiveDate, tolerance_days: u32) -> Option<usize> {
    let idx = dates.partition_point(|d| *d < date);
    let found = dates.get(idx)?;
    ((*found - date).num_days() <= i64::from(tolerance_days)).then_some(idx)
}
