//! Unit-root and stationarity tests.
//!
//! The augmented Dickey-Fuller test (constant, lag length chosen by AIC) uses
//! MacKinnon's response-surface p-values; KPSS (level) uses the Kwiatkowski et
//! al. critical values with linear interpolation of the p-value.

use serde::Serialize;

use crate::utils::ols::ols_fit;
use crate::utils::stats::{cdf_normal, rolling_mean, rolling_std};

/// Result of a stationarity test.
#[derive(Debug, Clone, Serialize)]
pub struct StationarityResult {
    pub statistic: f64,
    /// Approximate p-value.
    pub p_value: f64,
    /// Lags used in the test regression or HAC variance.
    pub lags: usize,
    /// Observations used in the regression.
    pub nobs: usize,
    /// Whether the test points to stationarity at the 5% level.
    pub is_stationary: bool,
    pub critical_values: CriticalValues,
}

impl StationarityResult {
    fn undefined(lags: usize) -> Self {
        Self {
            statistic: f64::NAN,
            p_value: f64::NAN,
            lags,
            nobs: 0,
            is_stationary: false,
            critical_values: CriticalValues::default(),
        }
    }
}

/// Critical values at the usual significance levels.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CriticalValues {
    #[serde(rename = "1%")]
    pub cv_1pct: f64,
    #[serde(rename = "5%")]
    pub cv_5pct: f64,
    #[serde(rename = "10%")]
    pub cv_10pct: f64,
}

/// Augmented Dickey-Fuller test with a constant.
///
/// Regresses `Δy_t` on `1, y_{t-1}, Δy_{t-1}, ..., Δy_{t-k}`. The lag length
/// `k` minimises AIC over `0..=max_lags` on a common sample, then the chosen
/// regression is refitted on all usable observations. `max_lags` defaults to
/// `12 (n / 100)^{1/4}`.
///
/// The null hypothesis is a unit root; `is_stationary` means it is rejected at 5%.
pub fn adf_test(series: &[f64], max_lags: Option<usize>) -> StationarityResult {
    let n = series.len();
    if n < 6 || series.iter().any(|v| !v.is_finite()) {
        return StationarityResult::undefined(0);
    }

    let default_lags = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    let max_lags = max_lags.unwrap_or(default_lags).min(n / 2 - 2);

    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best = (0, f64::INFINITY);
    for k in 0..=max_lags {
        if let Some(aic) = adf_regression(series, &diff, k, max_lags).map(|r| r.1) {
            if aic < best.1 {
                best = (k, aic);
            }
        }
    }
    let lags = best.0;

    let (t_stat, _, nobs) = match adf_regression(series, &diff, lags, lags) {
        Some(r) => r,
        None => return StationarityResult::undefined(lags),
    };
    if !t_stat.is_finite() {
        return StationarityResult::undefined(lags);
    }

    let critical_values = adf_critical_values(nobs);
    StationarityResult {
        statistic: t_stat,
        p_value: mackinnon_p_value(t_stat),
        lags,
        nobs,
        is_stationary: t_stat < critical_values.cv_5pct,
        critical_values,
    }
}

/// Fit the ADF regression with `k` lagged differences, using observations
/// from `start` (so several `k` can share a sample). Returns
/// `(t-statistic of y_{t-1}, AIC, nobs)`.
fn adf_regression(
    series: &[f64],
    diff: &[f64],
    k: usize,
    start: usize,
) -> Option<(f64, f64, usize)> {
    let rows = start..diff.len();
    let nobs = rows.len();
    if nobs < k + 4 {
        return None;
    }

    let y: Vec<f64> = rows.clone().map(|t| diff[t]).collect();
    let mut columns = vec![rows.clone().map(|t| series[t]).collect::<Vec<_>>()];
    for lag in 1..=k {
        columns.push(rows.clone().map(|t| diff[t - lag]).collect());
    }

    let fit = ols_fit(&y, &columns, true).ok()?;
    Some((fit.t_stat(0), fit.aic(true), nobs))
}

/// MacKinnon (2010) finite-sample critical values, constant only.
fn adf_critical_values(nobs: usize) -> CriticalValues {
    let t = nobs as f64;
    let surface = |b: [f64; 3]| b[0] + b[1] / t + b[2] / (t * t);
    CriticalValues {
        cv_1pct: surface([-3.43035, -6.5393, -16.786]),
        cv_5pct: surface([-2.86154, -2.8903, -4.234]),
        cv_10pct: surface([-2.56677, -1.5384, -2.809]),
    }
}

/// MacKinnon (1994) approximate asymptotic p-value, constant only, one series.
fn mackinnon_p_value(t_stat: f64) -> f64 {
    const TAU_MAX: f64 = 2.74;
    const TAU_MIN: f64 = -18.83;
    const TAU_STAR: f64 = -1.61;
    const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
    const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

    if t_stat > TAU_MAX {
        return 1.0;
    }
    if t_stat < TAU_MIN {
        return 0.0;
    }
    let coefs: &[f64] = if t_stat <= TAU_STAR { &SMALL_P } else { &LARGE_P };
    let z = coefs.iter().rev().fold(0.0, |acc, c| acc * t_stat + c);
    cdf_normal(z)
}

/// KPSS test for level stationarity.
///
/// The null hypothesis is stationarity; `is_stationary` means it is not
/// rejected at 5%. `lags` defaults to `4 (n / 100)^{1/4}` for the Bartlett HAC
/// variance.
pub fn kpss_test(series: &[f64], lags: Option<usize>) -> StationarityResult {
    let n = series.len();
    if n < 4 || series.iter().any(|v| !v.is_finite()) {
        return StationarityResult::undefined(0);
    }

    let lags = lags
        .unwrap_or_else(|| (4.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize)
        .clamp(1, n / 2);

    let mean = series.iter().sum::<f64>() / n as f64;
    let residuals: Vec<f64> = series.iter().map(|x| x - mean).collect();

    let mut partial = 0.0;
    let eta: f64 = residuals
        .iter()
        .map(|r| {
            partial += r;
            partial * partial
        })
        .sum::<f64>()
        / (n * n) as f64;

    let mut long_run = residuals.iter().map(|r| r * r).sum::<f64>() / n as f64;
    for j in 1..=lags {
        let weight = 1.0 - j as f64 / (lags + 1) as f64;
        let autocov: f64 = residuals[j..]
            .iter()
            .zip(&residuals)
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64;
        long_run += 2.0 * weight * autocov;
    }

    if long_run <= 0.0 {
        // A constant series is trivially stationary.
        return StationarityResult {
            is_stationary: true,
            nobs: n,
            ..StationarityResult::undefined(lags)
        };
    }

    let statistic = eta / long_run;
    let critical_values = CriticalValues {
        cv_1pct: 0.739,
        cv_5pct: 0.463,
        cv_10pct: 0.347,
    };

    StationarityResult {
        statistic,
        p_value: kpss_p_value(statistic),
        lags,
        nobs: n,
        is_stationary: statistic < critical_values.cv_5pct,
        critical_values,
    }
}

/// Interpolated KPSS p-value, clipped to [0.01, 0.10].
fn kpss_p_value(stat: f64) -> f64 {
    const TABLE: [(f64, f64); 4] = [(0.347, 0.10), (0.463, 0.05), (0.574, 0.025), (0.739, 0.01)];
    if stat <= TABLE[0].0 {
        return TABLE[0].1;
    }
    for pair in TABLE.windows(2) {
        let (x0, p0) = pair[0];
        let (x1, p1) = pair[1];
        if stat <= x1 {
            return p0 + (stat - x0) / (x1 - x0) * (p1 - p0);
        }
    }
    TABLE[3].1
}

/// Verdict of the ADF and KPSS tests taken together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StationarityVerdict {
    Stationary,
    NonStationary,
    Inconclusive,
}

/// ADF and KPSS run on the same series.
pub fn combined_stationarity(
    series: &[f64],
) -> (StationarityResult, StationarityResult, StationarityVerdict) {
    let adf = adf_test(series, None);
    let kpss = kpss_test(series, None);
    let verdict = match (adf.is_stationary, kpss.is_stationary) {
        (true, true) => StationarityVerdict::Stationary,
        (false, false) => StationarityVerdict::NonStationary,
        _ => StationarityVerdict::Inconclusive,
    };
    (adf, kpss, verdict)
}

/// ADF test plus rolling statistics over `window` observations.
#[derive(Debug, Clone, Serialize)]
pub struct StationarityReport {
    pub adf: StationarityResult,
    pub window: usize,
    #[serde(skip)]
    pub rolling_mean: Vec<f64>,
    #[serde(skip)]
    pub rolling_std: Vec<f64>,
}

/// Run the ADF test and compute rolling mean and standard deviation.
pub fn test_stationarity(series: &[f64], window: usize) -> StationarityReport {
    StationarityReport {
        adf: adf_test(series, None),
        window,
        rolling_mean: rolling_mean(series, window),
        rolling_std: rolling_std(series, window),
    }
}
