//! The interface shared by fitted models and the order search.

use crate::core::{Forecast, TimeSeries};
use crate::error::Result;

/// Fit on a series, then forecast ahead of its last observation.
///
/// Object-safe, so models can be stored as `Box<dyn Forecaster>`.
pub trait Forecaster {
    fn fit(&mut self, series: &TimeSeries) -> Result<()>;

    /// Point forecast for `horizon` steps.
    fn predict(&self, horizon: usize) -> Result<Forecast>;

    /// Point forecast with central intervals at `level` (e.g. 0.95).
    ///
    /// Models without an interval method return the point forecast.
    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let _ = level;
        self.predict(horizon)
    }

    /// In-sample one-step predictions aligned with the training series.
    fn fitted_values(&self) -> Option<&[f64]>;

    /// Training values minus fitted values.
    fn residuals(&self) -> Option<&[f64]>;

    fn name(&self) -> &str;

    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Boxed trait object.
///
/// ```
/// use arima_analyzer::models::{BoxedForecaster, Forecaster};
/// use arima_analyzer::models::arima::{AutoARIMA, SARIMA};
///
/// let models: Vec<BoxedForecaster> = vec![
///     Box::new(SARIMA::arima(1, 1, 1)),
///     Box::new(AutoARIMA::seasonal(8)),
/// ];
/// assert_eq!(models[0].name(), "ARIMA");
/// assert!(!models[1].is_fitted());
/// ```
pub type BoxedForecaster = Box<dyn Forecaster>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::arima::{ModelOrder, SARIMA};
    use crate::test_support::{ar1, make_timestamps};

    #[test]
    fn boxed_models_fit_and_predict() {
        let values: Vec<f64> = ar1(120, 0.5, 41).iter().map(|v| v + 10.0).collect();
        let series = TimeSeries::new(make_timestamps(120), values).unwrap();

        let mut models: Vec<BoxedForecaster> = vec![
            Box::new(SARIMA::arima(1, 0, 0)),
            Box::new(SARIMA::new(ModelOrder::new(0, 1, 1).with_seasonal(0, 0, 1, 4))),
        ];
        for model in models.iter_mut() {
            assert!(!model.is_fitted());
            model.fit(&series).unwrap();
            assert!(model.is_fitted());
            assert_eq!(model.residuals().unwrap().len(), 120);
            let forecast = model.predict_with_intervals(6, 0.9).unwrap();
            assert_eq!(forecast.horizon(), 6);
            assert!(forecast.has_intervals());
        }
        assert_eq!(models[1].name(), "SARIMA");
    }
}
