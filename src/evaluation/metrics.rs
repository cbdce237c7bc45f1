//! Point-forecast error metrics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};

/// Errors of a point forecast against the observed values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    /// Mean absolute percentage error, in percent.
    pub mape: f64,
}

impl ForecastMetrics {
    /// Metrics keyed by `mse`, `rmse`, `mae`, `mape`.
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("mse".to_string(), self.mse),
            ("rmse".to_string(), self.rmse),
            ("mae".to_string(), self.mae),
            ("mape".to_string(), self.mape),
        ])
    }
}

/// Compute MSE, RMSE, MAE and MAPE.
///
/// MAPE divides by `max(|y|, f64::EPSILON)`, so zero actuals give a large
/// but finite value.
///
/// ```
/// use arima_analyzer::evaluation::calculate_metrics;
///
/// let m = calculate_metrics(&[1.0, 2.0, 4.0], &[1.0, 3.0, 2.0]).unwrap();
/// assert!((m.mse - 5.0 / 3.0).abs() < 1e-12);
/// assert!((m.mae - 1.0).abs() < 1e-12);
/// ```
pub fn calculate_metrics(actual: &[f64], predicted: &[f64]) -> Result<ForecastMetrics> {
    if actual.is_empty() || predicted.is_empty() {
        return Err(AnalyzerError::EmptyData);
    }
    if actual.len() != predicted.len() {
        return Err(AnalyzerError::DimensionMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }
    if actual.iter().chain(predicted).any(|v| !v.is_finite()) {
        return Err(AnalyzerError::MissingValues);
    }

    let n = actual.len() as f64;
    let (mut se, mut ae, mut ape) = (0.0, 0.0, 0.0);
    for (a, p) in actual.iter().zip(predicted) {
        let err = a - p;
        se += err * err;
        ae += err.abs();
        ape += err.abs() / a.abs().max(f64::EPSILON);
    }
    let mse = se / n;

    Ok(ForecastMetrics {
        mse,
        rmse: mse.sqrt(),
        mae: ae / n,
        mape: 100.0 * ape / n,
    })
}
