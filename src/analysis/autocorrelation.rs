//! Sample autocorrelation and partial autocorrelation.

use serde::Serialize;

/// ACF and PACF up to a maximum lag, with the white-noise confidence band.
#[derive(Debug, Clone, Serialize)]
pub struct Correlogram {
    /// `acf[k]` for `k = 0..=max_lag`; `acf[0] == 1`.
    pub acf: Vec<f64>,
    /// `pacf[k]` for `k = 0..=max_lag`; `pacf[0] == 1`.
    pub pacf: Vec<f64>,
    /// Half-width of the 95% band, `1.96 / √n`.
    pub confidence: f64,
}

impl Correlogram {
    /// Correlogram with the default lag count `min(40, n / 4)`.
    pub fn compute(series: &[f64]) -> Self {
        Self::with_lags(series, default_lags(series.len()))
    }

    pub fn with_lags(series: &[f64], max_lag: usize) -> Self {
        let max_lag = max_lag.min(series.len().saturating_sub(1));
        let acf = acf(series, max_lag);
        let pacf = pacf_from_acf(&acf);
        let confidence = if series.is_empty() {
            f64::NAN
        } else {
            1.96 / (series.len() as f64).sqrt()
        };
        Self {
            acf,
            pacf,
            confidence,
        }
    }

    pub fn max_lag(&self) -> usize {
        self.acf.len().saturating_sub(1)
    }

    /// Lags `>= 1` whose ACF lies outside the confidence band.
    pub fn significant_acf_lags(&self) -> Vec<usize> {
        significant(&self.acf, self.confidence)
    }

    pub fn significant_pacf_lags(&self) -> Vec<usize> {
        significant(&self.pacf, self.confidence)
    }
}

fn significant(values: &[f64], band: f64) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, v)| v.abs() > band)
        .map(|(k, _)| k)
        .collect()
}

/// Number of lags shown by default: `min(40, n / 4)`.
pub fn default_lags(n: usize) -> usize {
    (n / 4).min(40)
}

/// Sample autocorrelation at a single lag (biased estimator, normalised by
/// the lag-0 autocovariance).
pub fn autocorrelation(series: &[f64], lag: usize) -> f64 {
    let n = series.len();
    if n <= lag {
        return f64::NAN;
    }
    let mean = series.iter().sum::<f64>() / n as f64;
    let denominator: f64 = series.iter().map(|x| (x - mean).powi(2)).sum();
    if denominator < 1e-12 {
        return if lag == 0 { 1.0 } else { 0.0 };
    }
    let numerator: f64 = series[lag..]
        .iter()
        .zip(series)
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum();
    numerator / denominator
}

/// Autocorrelations for lags `0..=max_lag`.
pub fn acf(series: &[f64], max_lag: usize) -> Vec<f64> {
    (0..=max_lag).map(|k| autocorrelation(series, k)).collect()
}

/// Partial autocorrelations for lags `0..=max_lag` by Durbin-Levinson.
pub fn pacf(series: &[f64], max_lag: usize) -> Vec<f64> {
    pacf_from_acf(&acf(series, max_lag))
}

fn pacf_from_acf(acf: &[f64]) -> Vec<f64> {
    if acf.is_empty() {
        return vec![];
    }
    let max_lag = acf.len() - 1;
    let mut out = vec![1.0; max_lag + 1];
    if max_lag == 0 {
        return out;
    }

    let mut phi = vec![0.0; max_lag + 1];
    let mut previous = vec![0.0; max_lag + 1];
    phi[1] = acf[1];
    out[1] = acf[1];
    let mut sigma = 1.0 - acf[1] * acf[1];

    for k in 2..=max_lag {
        if sigma.abs() < 1e-12 || acf[k].is_nan() {
            out[k..].iter_mut().for_each(|v| *v = f64::NAN);
            break;
        }
        previous[..k].copy_from_slice(&phi[..k]);
        let num = acf[k] - (1..k).map(|j| previous[j] * acf[k - j]).sum::<f64>();
        let kk = num / sigma;
        for j in 1..k {
            phi[j] = previous[j] - kk * previous[k - j];
        }
        phi[k] = kk;
        out[k] = kk;
        sigma *= 1.0 - kk * kk;
    }
    out
}
