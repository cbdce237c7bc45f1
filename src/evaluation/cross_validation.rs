//! Rolling-origin cross-validation.

use serde::Serialize;
use tracing::debug;

use crate::core::TimeSeries;
use crate::error::{AnalyzerError, Result};
use crate::evaluation::metrics::{calculate_metrics, ForecastMetrics};
use crate::models::Forecaster;
use crate::utils::stats::{mean, std_dev};

/// How the training window moves between folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CVStrategy {
    /// Fixed-size window sliding forward.
    Rolling,
    /// Window anchored at the start and growing.
    #[default]
    Expanding,
}

#[derive(Debug, Clone)]
pub struct CVConfig {
    pub horizon: usize,
    /// Training size of the first fold (and of every fold when rolling).
    pub initial_window: usize,
    pub step_size: usize,
    pub strategy: CVStrategy,
}

impl Default for CVConfig {
    fn default() -> Self {
        Self {
            horizon: 1,
            initial_window: 10,
            step_size: 1,
            strategy: CVStrategy::Expanding,
        }
    }
}

impl CVConfig {
    pub fn expanding(initial_window: usize, horizon: usize) -> Self {
        Self {
            initial_window,
            horizon,
            ..Default::default()
        }
    }

    pub fn rolling(window_size: usize, horizon: usize) -> Self {
        Self {
            initial_window: window_size,
            horizon,
            strategy: CVStrategy::Rolling,
            ..Default::default()
        }
    }

    /// `folds` consecutive, non-overlapping test windows of length `horizon`
    /// at the end of a series of length `n`.
    pub fn with_folds(n: usize, folds: usize, horizon: usize) -> Result<Self> {
        if folds == 0 || horizon == 0 {
            return Err(AnalyzerError::InvalidParameter(
                "folds and horizon must be positive".to_string(),
            ));
        }
        let held_out = folds * horizon;
        if held_out >= n {
            return Err(AnalyzerError::InsufficientData {
                needed: held_out + 1,
                got: n,
            });
        }
        Ok(Self::expanding(n - held_out, horizon).with_step_size(horizon))
    }

    pub fn with_step_size(mut self, step_size: usize) -> Self {
        self.step_size = step_size.max(1);
        self
    }

    pub fn with_strategy(mut self, strategy: CVStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Per-fold metrics and their aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct CVResults {
    pub n_folds: usize,
    pub aggregated: AggregatedMetrics,
    pub fold_metrics: Vec<ForecastMetrics>,
    #[serde(skip)]
    pub actual_values: Vec<f64>,
    #[serde(skip)]
    pub predicted_values: Vec<f64>,
}

/// Fold means, with standard deviations for RMSE and MAE.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AggregatedMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub mape: f64,
    pub rmse_std: f64,
    pub mae_std: f64,
}

impl AggregatedMetrics {
    fn from_folds(folds: &[ForecastMetrics]) -> Self {
        let column = |f: fn(&ForecastMetrics) -> f64| folds.iter().map(f).collect::<Vec<_>>();
        let (rmse, mae) = (column(|m| m.rmse), column(|m| m.mae));
        let spread = |v: &[f64]| if v.len() < 2 { 0.0 } else { std_dev(v) };
        Self {
            mse: mean(&column(|m| m.mse)),
            rmse: mean(&rmse),
            mae: mean(&mae),
            mape: mean(&column(|m| m.mape)),
            rmse_std: spread(&rmse),
            mae_std: spread(&mae),
        }
    }
}

/// Evaluate a model over successive forecast origins.
///
/// A fresh model from `model_factory` is fitted on each training window and
/// forecasts `horizon` steps. A configuration that yields no fold is an error.
pub fn cross_validate<F, Factory>(
    config: &CVConfig,
    series: &TimeSeries,
    model_factory: Factory,
) -> Result<CVResults>
where
    F: Forecaster,
    Factory: Fn() -> F,
{
    if config.horizon == 0 || config.initial_window == 0 {
        return Err(AnalyzerError::InvalidParameter(
            "horizon and initial window must be positive".to_string(),
        ));
    }
    let n = series.len();
    let step = config.step_size.max(1);
    let mut fold_metrics = Vec::new();
    let mut actual_values = Vec::new();
    let mut predicted_values = Vec::new();

    let mut origin = config.initial_window;
    while origin + config.horizon <= n {
        let train_start = match config.strategy {
            CVStrategy::Rolling => origin - config.initial_window,
            CVStrategy::Expanding => 0,
        };
        let train = series.slice(train_start, origin)?;

        let mut model = model_factory();
        model.fit(&train)?;
        let forecast = model.predict(config.horizon)?;
        let actual = &series.values()[origin..origin + config.horizon];
        let metrics = calculate_metrics(actual, forecast.values())?;
        debug!(fold = fold_metrics.len(), origin, rmse = metrics.rmse, "cross-validation fold");

        fold_metrics.push(metrics);
        actual_values.extend_from_slice(actual);
        predicted_values.extend_from_slice(forecast.values());
        origin += step;
    }

    if fold_metrics.is_empty() {
        return Err(AnalyzerError::InsufficientData {
            needed: config.initial_window + config.horizon,
            got: n,
        });
    }

    Ok(CVResults {
        n_folds: fold_metrics.len(),
        aggregated: AggregatedMetrics::from_folds(&fold_metrics),
        fold_metrics,
        actual_values,
        predicted_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Forecast;
    use crate::models::arima::SARIMA;
    use crate::test_support::{ar1, make_timestamps};
    use approx::assert_relative_eq;

    /// Repeats the last training value.
    struct LastValue {
        last: Option<f64>,
        fitted: Vec<f64>,
    }

    impl LastValue {
        fn new() -> Self {
            Self {
                last: None,
                fitted: Vec::new(),
            }
        }
    }

    impl Forecaster for LastValue {
        fn fit(&mut self, series: &TimeSeries) -> Result<()> {
            self.last = series.values().last().copied();
            self.fitted = series.values().to_vec();
            Ok(())
        }

        fn predict(&self, horizon: usize) -> Result<Forecast> {
            let last = self.last.ok_or(AnalyzerError::FitRequired)?;
            Ok(Forecast::from_values(vec![last; horizon]))
        }

        fn fitted_values(&self) -> Option<&[f64]> {
            self.last.map(|_| self.fitted.as_slice())
        }

        fn residuals(&self) -> Option<&[f64]> {
            None
        }

        fn name(&self) -> &str {
            "LastValue"
        }
    }

    fn linear(n: usize) -> TimeSeries {
        TimeSeries::new(make_timestamps(n), (0..n).map(|i| i as f64).collect()).unwrap()
    }

    #[test]
    fn expanding_folds() {
        let results = cross_validate(&CVConfig::expanding(10, 1), &linear(20), LastValue::new).unwrap();
        assert_eq!(results.n_folds, 10);
        assert_relative_eq!(results.aggregated.mae, 1.0);
        assert_relative_eq!(results.aggregated.mae_std, 0.0);
    }

    #[test]
    fn multi_step_rolling_folds() {
        let config = CVConfig::rolling(10, 3).with_step_size(2);
        let results = cross_validate(&config, &linear(20), LastValue::new).unwrap();
        // origins 10, 12, 14, 16
        assert_eq!(results.n_folds, 4);
        assert_eq!(results.actual_values.len(), 12);
        assert_relative_eq!(results.aggregated.mae, 2.0);
    }

    #[test]
    fn fold_layout_covers_the_tail() {
        let config = CVConfig::with_folds(100, 4, 5).unwrap();
        assert_eq!(config.initial_window, 80);
        assert_eq!(config.step_size, 5);
        let results = cross_validate(&config, &linear(100), LastValue::new).unwrap();
        assert_eq!(results.n_folds, 4);
        assert!(CVConfig::with_folds(10, 5, 2).is_err());
    }

    #[test]
    fn too_short_series_is_an_error() {
        let result = cross_validate(&CVConfig::expanding(10, 1), &linear(5), LastValue::new);
        assert!(matches!(result, Err(AnalyzerError::InsufficientData { .. })));
    }

    #[test]
    fn arima_cross_validation() {
        let values: Vec<f64> = ar1(160, 0.6, 4).iter().map(|v| v + 30.0).collect();
        let series = TimeSeries::new(make_timestamps(160), values).unwrap();
        let config = CVConfig::with_folds(160, 3, 5).unwrap();
        let results = cross_validate(&config, &series, || SARIMA::arima(1, 0, 0)).unwrap();
        assert_eq!(results.n_folds, 3);
        assert!(results.aggregated.rmse >= results.aggregated.mae);
        assert!(results.fold_metrics.iter().all(|m| m.mape >= 0.0));
    }
}
