//! High-level ARIMA workflow: search, refit, forecast, score.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::core::{Forecast, TimeSeries};
use crate::error::{AnalyzerError, Result};
use crate::evaluation::{calculate_metrics, ForecastMetrics};
use crate::models::arima::auto_arima::{AutoARIMA, AutoARIMAConfig};
use crate::models::arima::criteria::InformationCriteria;
use crate::models::arima::model::SARIMA;
use crate::models::arima::order::ModelOrder;
use crate::models::Forecaster;

/// Order, criteria and coefficients of a fitted model.
#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    pub order: ModelOrder,
    pub criteria: InformationCriteria,
    pub coefficients: IndexMap<String, f64>,
    pub converged: bool,
}

impl FitSummary {
    fn of(model: &SARIMA) -> Result<Self> {
        let criteria = *model.criteria().ok_or(AnalyzerError::FitRequired)?;
        Ok(Self {
            order: model.order(),
            criteria,
            coefficients: model.coefficients(),
            converged: model.converged(),
        })
    }
}

/// Searches, fits and forecasts a single series.
///
/// ```no_run
/// use arima_analyzer::models::arima::ARIMAAnalyzer;
/// # fn run(train: &arima_analyzer::core::TimeSeries) -> arima_analyzer::Result<()> {
/// let mut analyzer = ARIMAAnalyzer::new(true, Some(8));
/// analyzer.find_best(train)?;
/// analyzer.fit(train, None)?;
/// let forecast = analyzer.forecast(24, 0.05)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ARIMAAnalyzer {
    seasonal: bool,
    period: Option<usize>,
    search: AutoARIMAConfig,
    default_order: ModelOrder,
    best_order: Option<ModelOrder>,
    model: Option<SARIMA>,
}

impl ARIMAAnalyzer {
    pub fn new(seasonal: bool, period: Option<usize>) -> Self {
        Self {
            seasonal,
            period,
            search: AutoARIMAConfig::default(),
            default_order: ModelOrder::default(),
            best_order: None,
            model: None,
        }
    }

    /// Search bounds; the seasonal settings of the analyzer take precedence.
    pub fn with_search_config(mut self, config: AutoARIMAConfig) -> Self {
        self.search = config;
        self
    }

    /// Order used by [`fit`](Self::fit) before any search has run.
    pub fn with_default_order(mut self, order: ModelOrder) -> Self {
        self.default_order = order;
        self
    }

    pub fn is_seasonal(&self) -> bool {
        self.seasonal && self.period.is_some_and(|m| m >= 2)
    }

    pub fn best_order(&self) -> Option<ModelOrder> {
        self.best_order
    }

    pub fn model(&self) -> Option<&SARIMA> {
        self.model.as_ref()
    }

    /// Run the automatic order search and keep the winning model.
    pub fn find_best(&mut self, series: &TimeSeries) -> Result<FitSummary> {
        let config = match (self.is_seasonal(), self.period) {
            (true, Some(m)) => self.search.clone().with_seasonal_period(m),
            _ => self.search.clone().non_seasonal(),
        };
        info!("searching for the best ARIMA parameters");
        let mut auto = AutoARIMA::with_config(config);
        auto.fit(series)?;

        let model = auto.into_model().ok_or(AnalyzerError::FitRequired)?;
        let summary = FitSummary::of(&model)?;
        info!(order = %summary.order, aic = summary.criteria.aic, "best parameters found");
        self.best_order = Some(summary.order);
        self.model = Some(model);
        Ok(summary)
    }

    /// Fit `order`, else the searched order, else the default order.
    ///
    /// The seasonal part is dropped when the analyzer is non-seasonal.
    pub fn fit(&mut self, series: &TimeSeries, order: Option<ModelOrder>) -> Result<FitSummary> {
        let mut order = order.or(self.best_order).unwrap_or(self.default_order);
        if !self.is_seasonal() {
            order.seasonal = None;
        }
        info!(%order, "fitting model");
        let mut model = SARIMA::new(order);
        model.fit(series)?;
        let summary = FitSummary::of(&model)?;
        info!(
            aic = summary.criteria.aic,
            bic = summary.criteria.bic,
            converged = summary.converged,
            "model fitted"
        );
        self.model = Some(model);
        Ok(summary)
    }

    /// Forecast `steps` ahead with `1 - alpha` intervals.
    pub fn forecast(&self, steps: usize, alpha: f64) -> Result<Forecast> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(AnalyzerError::InvalidParameter(format!(
                "alpha must be in (0, 1), got {}",
                alpha
            )));
        }
        self.model
            .as_ref()
            .ok_or(AnalyzerError::FitRequired)?
            .predict_with_intervals(steps, 1.0 - alpha)
    }

    pub fn evaluate(&self, actual: &[f64], predicted: &[f64]) -> Result<ForecastMetrics> {
        calculate_metrics(actual, predicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ar1, make_timestamps};

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::new(make_timestamps(values.len()), values).unwrap()
    }

    #[test]
    fn fit_without_search_uses_default_order() {
        let train = series(ar1(200, 0.5, 31).iter().map(|v| v + 100.0).collect());
        let mut analyzer = ARIMAAnalyzer::new(false, None);
        let summary = analyzer.fit(&train, None).unwrap();
        assert_eq!(summary.order, ModelOrder::new(1, 1, 1));
        assert!(summary.coefficients.contains_key("sigma2"));
    }

    #[test]
    fn non_seasonal_analyzer_strips_seasonal_order() {
        let train = series(ar1(200, 0.5, 32).iter().map(|v| v + 100.0).collect());
        let mut analyzer = ARIMAAnalyzer::new(false, Some(4));
        let order = ModelOrder::new(1, 0, 0).with_seasonal(1, 0, 0, 4);
        let summary = analyzer.fit(&train, Some(order)).unwrap();
        assert!(summary.order.seasonal.is_none());
    }

    #[test]
    fn search_then_forecast() {
        let values: Vec<f64> = ar1(240, 0.6, 33).iter().map(|v| v + 100.0).collect();
        let (train, test) = values.split_at(200);
        let train = series(train.to_vec());

        let mut analyzer = ARIMAAnalyzer::new(false, None);
        let best = analyzer.find_best(&train).unwrap();
        assert_eq!(analyzer.best_order(), Some(best.order));

        let refit = analyzer.fit(&train, None).unwrap();
        assert_eq!(refit.order, best.order);

        let forecast = analyzer.forecast(test.len(), 0.05).unwrap();
        assert_eq!(forecast.horizon(), 40);
        assert!((forecast.level().unwrap() - 0.95).abs() < 1e-12);

        let metrics = analyzer.evaluate(test, forecast.values()).unwrap();
        assert!((metrics.rmse - metrics.mse.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn forecast_requires_fit() {
        let analyzer = ARIMAAnalyzer::new(true, Some(8));
        assert!(matches!(analyzer.forecast(5, 0.05), Err(AnalyzerError::FitRequired)));
        assert!(analyzer.forecast(5, 1.5).is_err());
    }
}
