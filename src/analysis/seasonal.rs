//! Classical moving-average seasonal decomposition.
//!
//! # Example
//!
//! ```
//! use arima_analyzer::analysis::{DecompositionModel, SeasonalAnalyzer};
//!
//! let series: Vec<f64> = (0..48)
//!     .map(|i| 10.0 + 0.1 * i as f64 + [2.0, -1.0, 0.5, -1.5][i % 4])
//!     .collect();
//! let analyzer = SeasonalAnalyzer::new(Some(4));
//! let parts = analyzer
//!     .decompose(&series, DecompositionModel::Additive, true)
//!     .unwrap();
//! assert!((parts.seasonal[0] - 2.0).abs() < 1e-9);
//! ```

use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::stationarity::{test_stationarity, StationarityReport};
use crate::core::TimeSeries;
use crate::error::{AnalyzerError, Result};
use crate::utils::stats::variance;

/// How the components combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecompositionModel {
    /// `y = T + S + R`
    #[default]
    Additive,
    /// `y = T * S * R`
    Multiplicative,
}

/// Trend, seasonal and residual components, all of the input's length.
///
/// Trend and residual entries are NaN at the ends unless the trend was
/// extrapolated.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub observed: Vec<f64>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub resid: Vec<f64>,
    pub period: usize,
    pub model: DecompositionModel,
}

impl Decomposition {
    /// One seasonal cycle of indices.
    pub fn seasonal_indices(&self) -> &[f64] {
        &self.seasonal[..self.period.min(self.seasonal.len())]
    }

    /// `max(0, 1 - Var(R) / Var(S + R))` (Wang, Smith and Hyndman, 2006).
    pub fn seasonal_strength(&self) -> f64 {
        self.strength(&self.seasonal)
    }

    /// `max(0, 1 - Var(R) / Var(T + R))`.
    pub fn trend_strength(&self) -> f64 {
        self.strength(&self.trend)
    }

    fn strength(&self, component: &[f64]) -> f64 {
        let combine = |c: f64, r: f64| match self.model {
            DecompositionModel::Additive => c + r,
            DecompositionModel::Multiplicative => c * r,
        };
        let (resid, combined): (Vec<f64>, Vec<f64>) = component
            .iter()
            .zip(&self.resid)
            .filter(|(c, r)| c.is_finite() && r.is_finite())
            .map(|(c, r)| (*r, combine(*c, *r)))
            .unzip();
        let var_combined = variance(&combined);
        if !(var_combined > 1e-12) {
            return 0.0;
        }
        (1.0 - variance(&resid) / var_combined).max(0.0)
    }
}

/// Summary of the seasonality analysis step of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalAnalysis {
    pub period: usize,
    pub stationarity: StationarityReport,
    /// Absent when the decomposition failed.
    pub seasonal_strength: Option<f64>,
    pub trend_strength: Option<f64>,
}

/// Seasonal analysis with a fixed or inferred period.
#[derive(Debug, Clone, Default)]
pub struct SeasonalAnalyzer {
    period: Option<usize>,
}

impl SeasonalAnalyzer {
    pub fn new(period: Option<usize>) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Option<usize> {
        self.period
    }

    /// Period to use for `series`: the configured one or an estimate.
    pub fn resolve_period(&self, series: &TimeSeries) -> usize {
        self.period
            .unwrap_or_else(|| estimate_seasonal_period(series))
    }

    /// Decompose raw values; the period must be configured.
    pub fn decompose(
        &self,
        values: &[f64],
        model: DecompositionModel,
        extrapolate_trend: bool,
    ) -> Result<Decomposition> {
        let period = self.period.ok_or_else(|| {
            AnalyzerError::InvalidParameter("seasonal period is required".into())
        })?;
        decompose(values, period, model, extrapolate_trend)
    }

    /// Decompose a series, inferring the period from its spacing when unset.
    ///
    /// Missing values are interpolated so every observation keeps its
    /// position in the seasonal cycle.
    pub fn decompose_series(
        &self,
        series: &TimeSeries,
        model: DecompositionModel,
        extrapolate_trend: bool,
    ) -> Result<Decomposition> {
        let filled = series.interpolated(true);
        decompose(filled.values(), self.resolve_period(series), model, extrapolate_trend)
    }

    /// ADF test plus rolling statistics.
    pub fn test_stationarity(&self, values: &[f64], window: usize) -> StationarityReport {
        test_stationarity(values, window)
    }

    /// Stationarity, decomposition and strength measures for one series.
    pub fn analyze(&self, series: &TimeSeries) -> (SeasonalAnalysis, Option<Decomposition>) {
        let period = self.resolve_period(series);
        let stationarity = test_stationarity(series.values(), period.max(2));
        let decomposition = match self.decompose_series(series, DecompositionModel::Additive, true) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(error = %e, period, "seasonal decomposition failed");
                None
            }
        };
        let analysis = SeasonalAnalysis {
            period,
            stationarity,
            seasonal_strength: decomposition.as_ref().map(|d| d.seasonal_strength()),
            trend_strength: decomposition.as_ref().map(|d| d.trend_strength()),
        };
        (analysis, decomposition)
    }
}

/// Seasonal period implied by the spacing of the first two observations.
///
/// Daily or coarser data cycles over a 5-day trading week; hourly data over an
/// 8-hour session; minute data over `480 / minutes` bars of a session.
pub fn estimate_seasonal_period(series: &TimeSeries) -> usize {
    const FALLBACK: usize = 5;
    let ts = series.timestamps();
    if ts.len() < 2 {
        return FALLBACK;
    }
    let delta = match (ts[1] - ts[0]).to_std() {
        Ok(d) => d,
        Err(_) => return FALLBACK,
    };
    let period = if delta >= StdDuration::from_secs(86_400) {
        5
    } else if delta >= StdDuration::from_secs(3_600) {
        8
    } else {
        let minutes = (delta.as_secs() / 60) as usize;
        if minutes == 0 {
            FALLBACK
        } else {
            (480 / minutes).max(1)
        }
    };
    debug!(?delta, period, "estimated seasonal period");
    period
}

/// Classical decomposition with a centred moving-average trend.
pub fn decompose(
    values: &[f64],
    period: usize,
    model: DecompositionModel,
    extrapolate_trend: bool,
) -> Result<Decomposition> {
    let n = values.len();
    if period < 2 {
        return Err(AnalyzerError::InvalidParameter(format!(
            "seasonal period must be at least 2, got {}",
            period
        )));
    }
    if n < 2 * period {
        return Err(AnalyzerError::InsufficientData {
            needed: 2 * period,
            got: n,
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(AnalyzerError::MissingValues);
    }
    if model == DecompositionModel::Multiplicative && values.iter().any(|v| *v <= 0.0) {
        return Err(AnalyzerError::InvalidParameter(
            "multiplicative decomposition needs strictly positive values".into(),
        ));
    }

    let mut trend = centered_moving_average(values, period);
    if extrapolate_trend {
        extrapolate_ends(&mut trend, (period / 2).max(2));
    }

    let detrended: Vec<f64> = values
        .iter()
        .zip(&trend)
        .map(|(y, t)| match model {
            DecompositionModel::Additive => y - t,
            DecompositionModel::Multiplicative => y / t,
        })
        .collect();

    let mut indices = vec![0.0; period];
    for (pos, index) in indices.iter_mut().enumerate() {
        let cycle: Vec<f64> = detrended
            .iter()
            .skip(pos)
            .step_by(period)
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        *index = if cycle.is_empty() {
            f64::NAN
        } else {
            cycle.iter().sum::<f64>() / cycle.len() as f64
        };
    }
    let centre = indices.iter().sum::<f64>() / period as f64;
    for index in indices.iter_mut() {
        match model {
            DecompositionModel::Additive => *index -= centre,
            DecompositionModel::Multiplicative => *index /= centre,
        }
    }

    let seasonal: Vec<f64> = (0..n).map(|i| indices[i % period]).collect();
    let resid: Vec<f64> = (0..n)
        .map(|i| match model {
            DecompositionModel::Additive => values[i] - trend[i] - seasonal[i],
            DecompositionModel::Multiplicative => values[i] / (trend[i] * seasonal[i]),
        })
        .collect();

    Ok(Decomposition {
        observed: values.to_vec(),
        trend,
        seasonal,
        resid,
        period,
        model,
    })
}

/// Seasonal strength of an additive decomposition, or `None` if the series
/// cannot be decomposed with this period.
pub fn seasonal_strength_of(values: &[f64], period: usize) -> Option<f64> {
    decompose(values, period, DecompositionModel::Additive, false)
        .ok()
        .map(|d| d.seasonal_strength())
}

/// Centred moving average of order `period` (`2 x period` when even).
fn centered_moving_average(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let half = period / 2;
    let weights: Vec<f64> = if period % 2 == 0 {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] /= 2.0;
        w[period] /= 2.0;
        w
    } else {
        vec![1.0 / period as f64; period]
    };

    let mut trend = vec![f64::NAN; n];
    for (i, slot) in trend.iter_mut().enumerate().take(n - half).skip(half) {
        *slot = weights
            .iter()
            .enumerate()
            .map(|(j, w)| w * values[i + j - half])
            .sum();
    }
    trend
}

/// Fill NaN trend ends by a least-squares line through the nearest `points`
/// valid values on each side.
fn extrapolate_ends(trend: &mut [f64], points: usize) {
    let first = trend.iter().position(|v| v.is_finite());
    let last = trend.iter().rposition(|v| v.is_finite());
    let (first, last) = match (first, last) {
        (Some(f), Some(l)) if l + 1 >= f + points => (f, l),
        _ => return,
    };

    let (a, b) = fit_line(trend, first..first + points);
    for (i, v) in trend.iter_mut().enumerate().take(first) {
        *v = a + b * i as f64;
    }
    let (a, b) = fit_line(trend, last + 1 - points..last + 1);
    for (i, v) in trend.iter_mut().enumerate().skip(last + 1) {
        *v = a + b * i as f64;
    }
}

/// Intercept and slope of `trend[i]` on `i` over `range`.
///
/// Closed form, so two points give the exact line through them.
fn fit_line(trend: &[f64], range: std::ops::Range<usize>) -> (f64, f64) {
    let n = range.len() as f64;
    let mean_x = range.clone().map(|i| i as f64).sum::<f64>() / n;
    let mean_y = range.clone().map(|i| trend[i]).sum::<f64>() / n;
    let (sxy, sxx) = range.fold((0.0, 0.0), |(sxy, sxx), i| {
        let dx = i as f64 - mean_x;
        (sxy + dx * (trend[i] - mean_y), sxx + dx * dx)
    });
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (mean_y - slope * mean_x, slope)
}
