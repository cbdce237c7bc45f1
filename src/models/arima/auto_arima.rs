//! Automatic ARIMA and SARIMA order selection.
//!
//! Differencing orders are fixed first by unit-root and seasonal-strength
//! tests, then `(p, q)(P, Q)` is chosen by minimising an information
//! criterion, either stepwise (Hyndman-Khandakar) or over a bounded grid.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::core::{Forecast, TimeSeries};
use crate::error::{AnalyzerError, Result};
use crate::models::arima::criteria::InformationCriterion;
use crate::models::arima::diff::{
    seasonal_difference, suggest_differencing, suggest_seasonal_differencing,
};
use crate::models::arima::model::SARIMA;
use crate::models::arima::order::ModelOrder;
use crate::models::Forecaster;

const MIN_OBSERVATIONS: usize = 10;

/// Search space and strategy for [`AutoARIMA`].
#[derive(Debug, Clone)]
pub struct AutoARIMAConfig {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    /// Maximum seasonal AR order (P).
    pub max_cap_p: usize,
    /// Maximum seasonal differencing (D).
    pub max_cap_d: usize,
    /// Maximum seasonal MA order (Q).
    pub max_cap_q: usize,
    /// Bound on `p + q + P + Q` in exhaustive mode.
    pub max_order: usize,
    /// Seasonal period; below 2 means non-seasonal.
    pub seasonal_period: usize,
    pub stepwise: bool,
    pub criterion: InformationCriterion,
    /// Log every candidate at info level.
    pub trace: bool,
    /// Stop the stepwise search after this many fits.
    pub max_models: usize,
    /// Fixed `d`, otherwise chosen by KPSS.
    pub d: Option<usize>,
    /// Fixed `D`, otherwise chosen by seasonal strength.
    pub cap_d: Option<usize>,
}

impl Default for AutoARIMAConfig {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_d: 2,
            max_q: 5,
            max_cap_p: 2,
            max_cap_d: 1,
            max_cap_q: 2,
            max_order: 5,
            seasonal_period: 0,
            stepwise: true,
            criterion: InformationCriterion::Aic,
            trace: false,
            max_models: 94,
            d: None,
            cap_d: None,
        }
    }
}

impl AutoARIMAConfig {
    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_p = max_p;
        self.max_d = max_d;
        self.max_q = max_q;
        self
    }

    pub fn with_seasonal_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_cap_p = max_p;
        self.max_cap_d = max_d;
        self.max_cap_q = max_q;
        self
    }

    pub fn with_seasonal_period(mut self, period: usize) -> Self {
        self.seasonal_period = period;
        self
    }

    /// Disable every seasonal term.
    pub fn non_seasonal(mut self) -> Self {
        self.seasonal_period = 0;
        self.max_cap_p = 0;
        self.max_cap_d = 0;
        self.max_cap_q = 0;
        self
    }

    pub fn with_criterion(mut self, criterion: InformationCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Skip the differencing tests and use the given orders.
    pub fn with_differencing(mut self, d: Option<usize>, cap_d: Option<usize>) -> Self {
        self.d = d;
        self.cap_d = cap_d;
        self
    }

    /// Fit every order with `p + q + P + Q <= max_order`.
    pub fn exhaustive(mut self) -> Self {
        self.stepwise = false;
        self
    }

    pub fn is_seasonal(&self) -> bool {
        self.seasonal_period >= 2
    }
}

/// Orders and conditioning shared by every candidate of one search.
#[derive(Debug, Clone, Copy)]
struct SearchSpace {
    d: usize,
    cap_d: usize,
    period: Option<usize>,
    max_p: usize,
    max_q: usize,
    max_cap_p: usize,
    max_cap_q: usize,
    conditioning: usize,
}

impl SearchSpace {
    fn order(&self, p: usize, q: usize, cap_p: usize, cap_q: usize) -> ModelOrder {
        let base = ModelOrder::new(p, self.d, q);
        match self.period {
            Some(m) => base.with_seasonal(cap_p, self.cap_d, cap_q, m),
            None => base,
        }
    }

    fn contains(&self, p: usize, q: usize, cap_p: usize, cap_q: usize) -> bool {
        p <= self.max_p && q <= self.max_q && cap_p <= self.max_cap_p && cap_q <= self.max_cap_q
    }

    fn starting_orders(&self) -> Vec<ModelOrder> {
        let (sp, sq) = (self.max_cap_p.min(1), self.max_cap_q.min(1));
        vec![
            self.order(self.max_p.min(2), self.max_q.min(2), sp, sq),
            self.order(0, 0, 0, 0),
            self.order(self.max_p.min(1), 0, sp, 0),
            self.order(0, self.max_q.min(1), 0, sq),
        ]
    }

    /// Orders one step away from `order`.
    fn neighbours(&self, order: &ModelOrder) -> Vec<ModelOrder> {
        let (p, q) = (order.p as i64, order.q as i64);
        let (cap_p, _, cap_q) = order.seasonal_orders();
        let (cap_p, cap_q) = (cap_p as i64, cap_q as i64);

        let mut moves = vec![
            (-1, 0, 0, 0),
            (1, 0, 0, 0),
            (0, -1, 0, 0),
            (0, 1, 0, 0),
            (-1, -1, 0, 0),
            (1, 1, 0, 0),
        ];
        if self.period.is_some() {
            moves.extend([
                (0, 0, -1, 0),
                (0, 0, 1, 0),
                (0, 0, 0, -1),
                (0, 0, 0, 1),
                (0, 0, -1, -1),
                (0, 0, 1, 1),
            ]);
        }

        moves
            .into_iter()
            .map(|(dp, dq, dsp, dsq)| (p + dp, q + dq, cap_p + dsp, cap_q + dsq))
            .filter(|&(a, b, c, e)| a >= 0 && b >= 0 && c >= 0 && e >= 0)
            .map(|(a, b, c, e)| (a as usize, b as usize, c as usize, e as usize))
            .filter(|&(a, b, c, e)| self.contains(a, b, c, e))
            .map(|(a, b, c, e)| self.order(a, b, c, e))
            .collect()
    }

    fn grid(&self, max_order: usize) -> Vec<ModelOrder> {
        let mut orders = Vec::new();
        for p in 0..=self.max_p {
            for q in 0..=self.max_q {
                for cap_p in 0..=self.max_cap_p {
                    for cap_q in 0..=self.max_cap_q {
                        if p + q + cap_p + cap_q <= max_order {
                            orders.push(self.order(p, q, cap_p, cap_q));
                        }
                    }
                }
            }
        }
        orders
    }
}

/// Automatic ARIMA/SARIMA order selection by information criterion.
#[derive(Debug, Clone)]
pub struct AutoARIMA {
    config: AutoARIMAConfig,
    model: Option<SARIMA>,
    selected_order: Option<ModelOrder>,
    model_scores: Vec<(ModelOrder, f64)>,
}

impl AutoARIMA {
    pub fn new() -> Self {
        Self::with_config(AutoARIMAConfig::default())
    }

    pub fn with_config(config: AutoARIMAConfig) -> Self {
        Self {
            config,
            model: None,
            selected_order: None,
            model_scores: Vec::new(),
        }
    }

    /// Seasonal search with period `period`.
    pub fn seasonal(period: usize) -> Self {
        Self::with_config(AutoARIMAConfig::default().with_seasonal_period(period))
    }

    pub fn config(&self) -> &AutoARIMAConfig {
        &self.config
    }

    pub fn selected_order(&self) -> Option<ModelOrder> {
        self.selected_order
    }

    /// The fitted model of the selected order.
    pub fn model(&self) -> Option<&SARIMA> {
        self.model.as_ref()
    }

    /// Consume the search and keep only the selected model.
    pub fn into_model(self) -> Option<SARIMA> {
        self.model
    }

    /// Every successfully fitted candidate, best score first.
    pub fn model_scores(&self) -> &[(ModelOrder, f64)] {
        &self.model_scores
    }

    pub fn best_score(&self) -> Option<f64> {
        self.model_scores.first().map(|(_, s)| *s)
    }

    /// Differencing orders `(d, D)` and the search bounds for `values`.
    fn search_space(&self, values: &[f64]) -> SearchSpace {
        let cfg = &self.config;
        let period = cfg.is_seasonal().then_some(cfg.seasonal_period);
        let m = period.unwrap_or(0);

        let cap_d = match period {
            Some(m) => cfg
                .cap_d
                .unwrap_or_else(|| suggest_seasonal_differencing(values, m, cfg.max_cap_d)),
            None => 0,
        };
        let d = cfg.d.unwrap_or_else(|| {
            suggest_differencing(&seasonal_difference(values, cap_d, m.max(1)), cfg.max_d)
        });

        let w_len = values.len().saturating_sub(d + cap_d * m);
        let budget = w_len / 3;
        let max_p = cfg.max_p.min(budget);
        let max_q = cfg.max_q.min(budget);
        let (mut max_cap_p, mut max_cap_q) = match period {
            Some(_) => (cfg.max_cap_p, cfg.max_cap_q),
            None => (0, 0),
        };
        while max_cap_p > 0 && max_p + max_cap_p * m > budget {
            max_cap_p -= 1;
        }
        while max_cap_q > 0 && max_q + max_cap_q * m > budget {
            max_cap_q -= 1;
        }

        SearchSpace {
            d,
            cap_d,
            period,
            max_p,
            max_q,
            max_cap_p,
            max_cap_q,
            conditioning: max_p + max_cap_p * m,
        }
    }

    /// Fit one candidate and score it; failures are logged and skipped.
    fn evaluate(
        &self,
        values: &[f64],
        order: ModelOrder,
        conditioning: usize,
    ) -> Option<(SARIMA, f64)> {
        let mut model = SARIMA::new(order).with_conditioning(conditioning);
        if let Err(e) = model.fit_values(values) {
            debug!(%order, error = %e, "candidate failed to fit");
            return None;
        }
        let score = model.criteria()?.get(self.config.criterion);
        if !score.is_finite() {
            debug!(%order, "candidate has a non-finite score");
            return None;
        }
        if self.config.trace {
            info!(%order, criterion = %self.config.criterion, score, "candidate fitted");
        } else {
            debug!(%order, score, "candidate fitted");
        }
        Some((model, score))
    }

    fn stepwise_search(
        &self,
        values: &[f64],
        space: &SearchSpace,
        scores: &mut Vec<(ModelOrder, f64)>,
    ) -> Option<(SARIMA, f64)> {
        let mut tried = HashSet::new();
        let mut best: Option<(SARIMA, f64)> = None;

        let consider = |order: ModelOrder,
                             best: &mut Option<(SARIMA, f64)>,
                             scores: &mut Vec<(ModelOrder, f64)>|
         -> bool {
            let Some((model, score)) = self.evaluate(values, order, space.conditioning) else {
                return false;
            };
            scores.push((order, score));
            let improved = best.as_ref().map_or(true, |(_, b)| score < *b);
            if improved {
                *best = Some((model, score));
            }
            improved
        };

        for order in space.starting_orders() {
            if tried.len() >= self.config.max_models {
                break;
            }
            if tried.insert(order) {
                consider(order, &mut best, scores);
            }
        }

        loop {
            let Some(current) = best.as_ref().map(|(m, _)| m.order()) else {
                break;
            };
            let mut improved = false;
            for order in space.neighbours(&current) {
                if tried.len() >= self.config.max_models {
                    break;
                }
                if !tried.insert(order) {
                    continue;
                }
                if consider(order, &mut best, scores) {
                    improved = true;
                    break;
                }
            }
            if !improved {
                break;
            }
        }
        debug!(fits = tried.len(), "stepwise search finished");
        best
    }

    fn exhaustive_search(
        &self,
        values: &[f64],
        space: &SearchSpace,
        scores: &mut Vec<(ModelOrder, f64)>,
    ) -> Option<(SARIMA, f64)> {
        let mut best: Option<(SARIMA, f64)> = None;
        for order in space.grid(self.config.max_order) {
            if let Some((model, score)) = self.evaluate(values, order, space.conditioning) {
                scores.push((order, score));
                if best.as_ref().map_or(true, |(_, b)| score < *b) {
                    best = Some((model, score));
                }
            }
        }
        best
    }
}

impl Default for AutoARIMA {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for AutoARIMA {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.values();
        if values.is_empty() {
            return Err(AnalyzerError::EmptyData);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalyzerError::MissingValues);
        }
        if values.len() < MIN_OBSERVATIONS {
            return Err(AnalyzerError::InsufficientData {
                needed: MIN_OBSERVATIONS,
                got: values.len(),
            });
        }

        let space = self.search_space(values);
        info!(
            d = space.d,
            seasonal_d = space.cap_d,
            period = space.period.unwrap_or(0),
            stepwise = self.config.stepwise,
            "searching ARIMA orders"
        );

        let mut scores = Vec::new();
        let best = if self.config.stepwise {
            self.stepwise_search(values, &space, &mut scores)
        } else {
            self.exhaustive_search(values, &space, &mut scores)
        };
        let Some((model, score)) = best else {
            return Err(AnalyzerError::ComputationError(
                "no ARIMA model could be fitted to the series".to_string(),
            ));
        };

        scores.sort_by(|a, b| a.1.total_cmp(&b.1));
        let order = model.order();
        info!(
            %order,
            criterion = %self.config.criterion,
            score,
            candidates = scores.len(),
            "selected model"
        );

        self.selected_order = Some(order);
        self.model = Some(model);
        self.model_scores = scores;
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        self.model
            .as_ref()
            .ok_or(AnalyzerError::FitRequired)?
            .predict(horizon)
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        self.model
            .as_ref()
            .ok_or(AnalyzerError::FitRequired)?
            .predict_with_intervals(horizon, level)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.model.as_ref()?.fitted_values()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.model.as_ref()?.residuals()
    }

    fn name(&self) -> &str {
        "AutoARIMA"
    }
}
