//! Descriptive summary of a price series.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::analysis::stationarity::adf_test;
use crate::core::TimeSeries;
use crate::utils::stats::{mean, quantile, std_dev};

/// Descriptive statistics, normality and stationarity of one series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSummary {
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub count: usize,
    pub missing: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
    /// D'Agostino-Pearson K² p-value.
    pub normality_p_value: f64,
    pub adf_p_value: f64,
    /// ADF p-value at or below 0.05.
    pub is_stationary: bool,
    /// Pearson correlation of the series with itself shifted by one.
    pub lag1_autocorrelation: f64,
}

impl SeriesSummary {
    pub fn new(series: &TimeSeries, title: impl Into<String>) -> Self {
        let values: Vec<f64> = series
            .values()
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        let adf = adf_test(&values, None);

        Self {
            title: title.into(),
            start: series.first_timestamp(),
            end: series.last_timestamp(),
            count: values.len(),
            missing: series.missing_count(),
            mean: mean(&values),
            std: std_dev(&values),
            min: quantile(&values, 0.0),
            q25: quantile(&values, 0.25),
            median: quantile(&values, 0.5),
            q75: quantile(&values, 0.75),
            max: quantile(&values, 1.0),
            normality_p_value: normality_test(&values).1,
            adf_p_value: adf.p_value,
            is_stationary: adf.p_value <= 0.05,
            lag1_autocorrelation: lag1_autocorrelation(&values),
        }
    }
}

impl fmt::Display for SeriesSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{}", rule)?;
        writeln!(f, "{}", self.title.to_uppercase())?;
        writeln!(f, "{}", rule)?;
        match (self.start, self.end) {
            (Some(start), Some(end)) => writeln!(f, "Period: {} - {}", start, end)?,
            _ => writeln!(f, "Period: n/a")?,
        }
        writeln!(f, "Observations: {}", self.count)?;
        writeln!(f, "Missing values: {}", self.missing)?;
        writeln!(f, "mean {:>14.4}", self.mean)?;
        writeln!(f, "std  {:>14.4}", self.std)?;
        writeln!(f, "min  {:>14.4}", self.min)?;
        writeln!(f, "25%  {:>14.4}", self.q25)?;
        writeln!(f, "50%  {:>14.4}", self.median)?;
        writeln!(f, "75%  {:>14.4}", self.q75)?;
        writeln!(f, "max  {:>14.4}", self.max)?;
        writeln!(f, "Normality test (p-value): {:.4}", self.normality_p_value)?;
        writeln!(f, "Dickey-Fuller test (p-value): {:.4}", self.adf_p_value)?;
        if self.is_stationary {
            writeln!(f, "Series is stationary (p <= 0.05)")?;
        } else {
            writeln!(f, "Series is NOT stationary (p > 0.05)")?;
        }
        writeln!(f, "Autocorrelation (lag 1): {:.4}", self.lag1_autocorrelation)?;
        write!(f, "{}", rule)
    }
}

/// Pearson correlation between `x[1..]` and `x[..n-1]`.
pub fn lag1_autocorrelation(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return f64::NAN;
    }
    let a = &values[1..];
    let b = &values[..values.len() - 1];
    let (ma, mb) = (mean(a), mean(b));
    let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
    let va: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
    let vb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
    if va <= 0.0 || vb <= 0.0 {
        return f64::NAN;
    }
    cov / (va * vb).sqrt()
}

/// D'Agostino-Pearson omnibus normality test; returns `(K², p-value)`.
///
/// Combines the skewness and kurtosis z-scores; needs at least 8 observations.
pub fn normality_test(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n < 8 {
        return (f64::NAN, f64::NAN);
    }
    let z_skew = skewness_z(values);
    let z_kurt = kurtosis_z(values);
    let k2 = z_skew * z_skew + z_kurt * z_kurt;
    if !k2.is_finite() {
        return (f64::NAN, f64::NAN);
    }
    let p = match ChiSquared::new(2.0) {
        Ok(chi2) => chi2.sf(k2),
        Err(_) => f64::NAN,
    };
    (k2, p)
}

fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let m = values.iter().sum::<f64>() / n;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

fn skewness_z(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let (m2, m3, _) = central_moments(values);
    if m2 <= 0.0 {
        return f64::NAN;
    }
    let b2 = m3 / m2.powf(1.5);
    let y = b2 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let y = if y == 0.0 { 1.0 } else { y };
    let ratio = y / alpha;
    delta * (ratio + (ratio * ratio + 1.0).sqrt()).ln()
}

fn kurtosis_z(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let (m2, _, m4) = central_moments(values);
    if m2 <= 0.0 {
        return f64::NAN;
    }
    let b2 = m4 / (m2 * m2);
    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let var_b2 = 24.0 * n * (n - 2.0) * (n - 3.0)
        / ((n + 1.0) * (n + 1.0) * (n + 3.0) * (n + 5.0));
    let x = (b2 - expected) / var_b2.sqrt();
    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();
    (term1 - term2) / (2.0 / (9.0 * a)).sqrt()
}
