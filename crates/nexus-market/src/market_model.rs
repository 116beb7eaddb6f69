//! Market-model estimator: OLS of subject returns on benchmark returns

use crate::error::StudyError;
use serde::{Deserialize, Serialize};

/// Benchmark variance at or below this counts as zero
const DEGENERATE_VARIANCE: f64 = 1e-20;

/// Fitted `R_subject = alpha + beta * R_benchmark + e`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketModelParameters {
    pub alpha: f64,
    pub beta: f64,
    /// Sample standard deviation (n-1) of the fit residuals
    pub residual_std_dev: f64,
    pub observations: usize,
}

impl MarketModelParameters {
    /// Expected subject return for a benchmark return
    pub fn predict(&self, benchmark_return: f64) -> f64 {
        self.alpha + self.beta * benchmark_return
    }
}

/// Fit the market model over an estimation window.
///
/// Both slices must be date-aligned and of equal length. Deterministic:
/// identical inputs give bit-identical parameters.
pub fn fit(
    ticker: &str,
    subject: &[f64],
    benchmark: &[f64],
    min_points: usize,
) -> Result<MarketModelParameters, StudyError> {
    if subject.len() != benchmark.len() {
        return Err(StudyError::MisalignedSeries {
            ticker: ticker.to_string(),
            subject: subject.len(),
            benchmark: benchmark.len(),
        });
    }

    let n = subject.len();
    if n < min_points.max(3) {
        return Err(StudyError::InsufficientData {
            ticker: ticker.to_string(),
            window: "estimation window",
            needed: min_points.max(3),
            available: n,
        });
    }

    let nf = n as f64;
    let mean_x = benchmark.iter().sum::<f64>() / nf;
    let mean_y = subject.iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in benchmark.iter().zip(subject) {
        let dx = x - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }

    let variance = sxx / (nf - 1.0);
    if !variance.is_finite() || variance <= DEGENERATE_VARIANCE {
        return Err(StudyError::DegenerateRegression {
            ticker: ticker.to_string(),
            variance,
        });
    }

    let beta = sxy / sxx;
    let alpha = mean_y - beta * mean_x;

    let residuals: Vec<f64> = benchmark
        .iter()
        .zip(subject)
        .map(|(x, y)| y - (alpha + beta * x))
        .collect();
    let mean_r = residuals.iter().sum::<f64>() / nf;
    let ss_r: f64 = residuals.iter().map(|r| (r - mean_r).powi(2)).sum();
    let residual_std_dev = (ss_r / (nf - 1.0)).sqrt();

    Ok(MarketModelParameters {
        alpha,
        beta,
        residual_std_dev,
        observations: n,
    })
}
