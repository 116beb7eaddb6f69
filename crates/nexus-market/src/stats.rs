//! Statistical helpers for return series.
//!
//! All functions are pure and return `None` rather than NaN when the input
//! cannot support the statistic.

/// Trading days per year used for annualisation
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Mean of a slice of values.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n-1 denominator).
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(sum_sq / (n - 1) as f64)
}

/// Sample standard deviation (n-1 denominator).
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Sample covariance of two equal-length slices.
pub fn covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let sum: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    Some(sum / (n - 1) as f64)
}

/// Pearson correlation; `None` when either side is constant.
pub fn correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    let cov = covariance(x, y)?;
    let sx = sample_std_dev(x)?;
    let sy = sample_std_dev(y)?;
    if sx == 0.0 || sy == 0.0 {
        return None;
    }
    Some((cov / (sx * sy)).clamp(-1.0, 1.0))
}

/// Slope of `y` on `x` (cov / var); `None` when `x` is constant.
pub fn beta(y: &[f64], x: &[f64]) -> Option<f64> {
    let var = sample_variance(x)?;
    if var == 0.0 {
        return None;
    }
    Some(covariance(x, y)? / var)
}

/// Correlation over each trailing window of `window` points.
///
/// Element `i` covers points `i..i + window`; degenerate windows are `None`.
pub fn rolling_correlation(x: &[f64], y: &[f64], window: usize) -> Vec<Option<f64>> {
    if window < 2 || x.len() != y.len() || x.len() < window {
        return Vec::new();
    }
    (0..=x.len() - window)
        .map(|i| correlation(&x[i..i + window], &y[i..i + window]))
        .collect()
}

/// Annualised volatility of daily returns.
pub fn annualized_volatility(returns: &[f64]) -> Option<f64> {
    sample_std_dev(returns).map(|s| s * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Trailing-window annualised volatility, one value per full window.
pub fn rolling_volatility(returns: &[f64], window: usize) -> Vec<f64> {
    if window < 2 || returns.len() < window {
        return Vec::new();
    }
    returns
        .windows(window)
        .filter_map(annualized_volatility)
        .collect()
}

/// Compounded return of a run of simple returns.
pub fn compound(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// Two-tailed p-value of a t statistic.
///
/// `t == 0` maps to exactly 1.0; fewer than one degree of freedom yields
/// `None`.
pub fn two_tailed_p_value(t: f64, degrees_of_freedom: f64) -> Option<f64> {
    if !t.is_finite() || degrees_of_freedom < 1.0 {
        return None;
    }
    if t == 0.0 {
        return Some(1.0);
    }
    // P(|T| > t) = I_x(df/2, 1/2) with x = df / (df + t^2)
    let x = degrees_of_freedom / (degrees_of_freedom + t * t);
    Some(incomplete_beta(degrees_of_freedom / 2.0, 0.5, x).clamp(0.0, 1.0))
}

/// Regularized incomplete beta function I_x(a, b)
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = libm::lgamma(a + b) - libm::lgamma(a) - libm::lgamma(b)
        + a * x.ln()
        + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fastest below the mean of the distribution
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Lentz evaluation of the incomplete beta continued fraction
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERATIONS: u32 = 300;
    const EPSILON: f64 = 1e-15;
    const TINY: f64 = 1e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };
    let (qab, qap, qam) = (a + b, a + 1.0, a - 1.0);

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;
    for m in 1..=MAX_ITERATIONS {
        let m = f64::from(m);
        let m2 = 2.0 * m;

        let even = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + even * d);
        c = guard(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + odd * d);
        c = guard(1.0 + odd / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    h
}
