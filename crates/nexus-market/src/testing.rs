//! Synthetic series for unit tests

use crate::series::ReturnSeries;
use chrono::{Datelike, NaiveDate, Weekday};

/// `n` consecutive weekdays starting at `start` (or the next weekday)
pub(crate) fn weekdays(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(n)
        .collect()
}

/// Deterministic noise in `[-0.5, 0.5)`
pub(crate) struct Lcg(pub u64);

impl Lcg {
    pub(crate) fn next(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((self.0 >> 32) as u32) as f64 / f64::from(u32::MAX) - 0.5
    }
}

/// Random-walk benchmark with roughly 1% daily moves
pub(crate) fn benchmark(ticker: &str, dates: &[NaiveDate], seed: u64) -> ReturnSeries {
    let mut rng = Lcg(seed);
    let points = dates.iter().map(|d| (*d, rng.next() * 0.02)).collect();
    ReturnSeries::new(ticker, points).unwrap()
}

/// `alpha + beta * benchmark + noise` on the benchmark's dates
pub(crate) fn follower(
    ticker: &str,
    benchmark: &ReturnSeries,
    alpha: f64,
    beta: f64,
    seed: u64,
) -> ReturnSeries {
    let mut rng = Lcg(seed);
    let points = benchmark
        .dates()
        .iter()
        .zip(benchmark.values())
        .map(|(d, b)| (*d, alpha + beta * b + rng.next() * 0.01))
        .collect();
    ReturnSeries::new(ticker, points).unwrap()
}
