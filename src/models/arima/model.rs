//! Multiplicative seasonal ARIMA estimated by conditional sum of squares.
//!
//! The model for the differenced series `w_t = (1 - B)^d (1 - B^m)^D y_t` is
//!
//! ```text
//! φ(B) Φ(B^m) (w_t - μ) = θ(B) Θ(B^m) e_t
//! ```
//!
//! Coefficients are searched in an unconstrained space and mapped through
//! [`constrain_stationary`], so every estimate is stationary and invertible.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::core::{Forecast, TimeSeries};
use crate::error::{AnalyzerError, Result};
use crate::models::arima::criteria::InformationCriteria;
use crate::models::arima::diff::{full_difference, integrate};
use crate::models::arima::order::ModelOrder;
use crate::models::arima::poly::{
    ar_operator, constrain_stationary, differencing_operator, ma_operator, polymul, psi_weights,
    sparse_terms,
};
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::stats::quantile_normal;

/// Residual variance floor, keeps the likelihood finite for exact fits.
const MIN_VARIANCE: f64 = 1e-12;

/// AR and MA coefficients of both polynomial pairs.
#[derive(Debug, Clone, Default, PartialEq)]
struct Coefficients {
    ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ar: Vec<f64>,
    seasonal_ma: Vec<f64>,
}

impl Coefficients {
    /// Map an unconstrained parameter vector laid out as `[ar, ma, sar, sma]`.
    fn from_unconstrained(order: &ModelOrder, raw: &[f64]) -> Self {
        let (sp, _, sq) = order.seasonal_orders();
        let (ar, rest) = raw.split_at(order.p);
        let (ma, rest) = rest.split_at(order.q);
        let (sar, sma) = rest.split_at(sp);
        debug_assert_eq!(sma.len(), sq);
        let invertible =
            |x: &[f64]| -> Vec<f64> { constrain_stationary(x).iter().map(|c| -c).collect() };
        Self {
            ar: constrain_stationary(ar),
            ma: invertible(ma),
            seasonal_ar: constrain_stationary(sar),
            seasonal_ma: invertible(sma),
        }
    }

    /// `(lag, a_lag)` pairs of `w_t - μ = Σ a (w_{t-lag} - μ) + ...`.
    fn ar_terms(&self, period: usize) -> Vec<(usize, f64)> {
        sparse_terms(&ar_operator(&self.ar, &self.seasonal_ar, period))
            .into_iter()
            .map(|(lag, c)| (lag, -c))
            .collect()
    }

    /// `(lag, b_lag)` pairs of the MA part.
    fn ma_terms(&self, period: usize) -> Vec<(usize, f64)> {
        sparse_terms(&ma_operator(&self.ma, &self.seasonal_ma, period))
    }
}

/// One-step prediction at `t` given the history in `w` and `e`.
#[inline]
fn predict_at(
    t: usize,
    w: &[f64],
    e: &[f64],
    mu: f64,
    ar_terms: &[(usize, f64)],
    ma_terms: &[(usize, f64)],
) -> f64 {
    let mut pred = mu;
    for &(lag, a) in ar_terms {
        if t >= lag {
            pred += a * (w[t - lag] - mu);
        }
    }
    for &(lag, b) in ma_terms {
        if t >= lag {
            pred += b * e[t - lag];
        }
    }
    pred
}

/// Conditional residuals from `start` onwards; earlier residuals are zero.
/// Returns the residual vector and its sum of squares.
fn conditional_residuals(
    w: &[f64],
    mu: f64,
    ar_terms: &[(usize, f64)],
    ma_terms: &[(usize, f64)],
    start: usize,
) -> (Vec<f64>, f64) {
    let mut e = vec![0.0; w.len()];
    let mut css = 0.0;
    for t in start..w.len() {
        let err = w[t] - predict_at(t, w, &e, mu, ar_terms, ma_terms);
        e[t] = err;
        css += err * err;
    }
    (e, css)
}

#[derive(Debug, Clone)]
struct FittedState {
    coefficients: Coefficients,
    intercept: f64,
    original: Vec<f64>,
    differenced: Vec<f64>,
    /// Residuals on the differenced scale, zero during burn-in.
    innovations: Vec<f64>,
    /// Aligned with `original`; NaN during burn-in.
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    sigma2: f64,
    criteria: InformationCriteria,
    converged: bool,
}

/// Seasonal ARIMA `(p,d,q)(P,D,Q)[m]`; a plain ARIMA when the order has no
/// seasonal part.
///
/// The intercept is the mean of the differenced series. By default it is
/// included when `d + D < 2`.
#[derive(Debug, Clone)]
pub struct SARIMA {
    order: ModelOrder,
    include_intercept: Option<bool>,
    /// Minimum number of differenced observations conditioned on.
    conditioning: usize,
    state: Option<FittedState>,
}

impl SARIMA {
    pub fn new(order: ModelOrder) -> Self {
        Self {
            order,
            include_intercept: None,
            conditioning: 0,
            state: None,
        }
    }

    /// Non-seasonal ARIMA(p, d, q).
    pub fn arima(p: usize, d: usize, q: usize) -> Self {
        Self::new(ModelOrder::new(p, d, q))
    }

    /// Force the intercept on or off.
    pub fn with_intercept(mut self, include: bool) -> Self {
        self.include_intercept = Some(include);
        self
    }

    /// Condition the sum of squares on at least `lags` initial observations.
    ///
    /// Models compared by an information criterion must share the same
    /// effective sample; the order search sets this to its largest AR lag.
    pub fn with_conditioning(mut self, lags: usize) -> Self {
        self.conditioning = lags;
        self
    }

    pub fn order(&self) -> ModelOrder {
        self.order
    }

    fn state(&self) -> Result<&FittedState> {
        self.state.as_ref().ok_or(AnalyzerError::FitRequired)
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        match &self.state {
            Some(s) => &s.coefficients.ar,
            None => &[],
        }
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        match &self.state {
            Some(s) => &s.coefficients.ma,
            None => &[],
        }
    }

    pub fn seasonal_ar_coefficients(&self) -> &[f64] {
        match &self.state {
            Some(s) => &s.coefficients.seasonal_ar,
            None => &[],
        }
    }

    pub fn seasonal_ma_coefficients(&self) -> &[f64] {
        match &self.state {
            Some(s) => &s.coefficients.seasonal_ma,
            None => &[],
        }
    }

    /// Mean of the differenced series, 0.0 without intercept.
    pub fn intercept(&self) -> f64 {
        self.state.as_ref().map_or(0.0, |s| s.intercept)
    }

    /// Residual variance σ².
    pub fn sigma2(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sigma2)
    }

    pub fn criteria(&self) -> Option<&InformationCriteria> {
        self.state.as_ref().map(|s| &s.criteria)
    }

    pub fn aic(&self) -> Option<f64> {
        self.criteria().map(|c| c.aic)
    }

    pub fn bic(&self) -> Option<f64> {
        self.criteria().map(|c| c.bic)
    }

    /// Whether the optimiser met its tolerance.
    pub fn converged(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.converged)
    }

    /// Named estimates in the usual `ar.L1`, `ma.S.L12` style, then `sigma2`.
    pub fn coefficients(&self) -> IndexMap<String, f64> {
        let mut out = IndexMap::new();
        let Some(state) = &self.state else {
            return out;
        };
        let period = self.order.period();
        if self.has_intercept() {
            out.insert("intercept".to_string(), state.intercept);
        }
        let c = &state.coefficients;
        for (i, v) in c.ar.iter().enumerate() {
            out.insert(format!("ar.L{}", i + 1), *v);
        }
        for (i, v) in c.ma.iter().enumerate() {
            out.insert(format!("ma.L{}", i + 1), *v);
        }
        for (i, v) in c.seasonal_ar.iter().enumerate() {
            out.insert(format!("ar.S.L{}", (i + 1) * period), *v);
        }
        for (i, v) in c.seasonal_ma.iter().enumerate() {
            out.insert(format!("ma.S.L{}", (i + 1) * period), *v);
        }
        out.insert("sigma2".to_string(), state.sigma2);
        out
    }

    fn has_intercept(&self) -> bool {
        let (_, sd, _) = self.order.seasonal_orders();
        self.include_intercept.unwrap_or(self.order.d + sd < 2)
    }

    /// Estimated parameters: coefficients, intercept and σ².
    pub fn num_params(&self) -> usize {
        self.order.num_coefficients() + usize::from(self.has_intercept()) + 1
    }

    /// Shortest series this order can be fitted to.
    pub fn min_observations(&self) -> usize {
        self.order.differencing_lag() + self.burn_in() + self.num_params() + 1
    }

    fn burn_in(&self) -> usize {
        self.order.ar_lag().max(self.conditioning)
    }

    /// Fit to raw values.
    pub fn fit_values(&mut self, values: &[f64]) -> Result<()> {
        if values.is_empty() {
            return Err(AnalyzerError::EmptyData);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalyzerError::MissingValues);
        }
        let order = self.order;
        let period = order.period();
        if order.is_seasonal() && period < 2 {
            return Err(AnalyzerError::InvalidParameter(format!(
                "seasonal period must be at least 2, got {}",
                period
            )));
        }
        let needed = self.min_observations();
        if values.len() < needed {
            return Err(AnalyzerError::InsufficientData {
                needed,
                got: values.len(),
            });
        }

        let (_, sd, _) = order.seasonal_orders();
        let w = full_difference(values, order.d, sd, period);
        let start = self.burn_in();
        let n_eff = w.len() - start;
        let mu = if self.has_intercept() {
            w.iter().sum::<f64>() / w.len() as f64
        } else {
            0.0
        };

        let k = order.num_coefficients();
        let config = NelderMeadConfig {
            max_iter: 250 * (k + 1),
            tolerance: 1e-9,
            initial_step: 0.25,
            ..Default::default()
        };
        let result = nelder_mead(
            |raw| {
                let c = Coefficients::from_unconstrained(&order, raw);
                let (_, css) =
                    conditional_residuals(&w, mu, &c.ar_terms(period), &c.ma_terms(period), start);
                css / n_eff as f64
            },
            &vec![0.0; k],
            config,
        );
        if !result.optimal_value.is_finite() {
            return Err(AnalyzerError::ComputationError(format!(
                "{} objective did not reach a finite value",
                order
            )));
        }

        let coefficients = Coefficients::from_unconstrained(&order, &result.optimal_point);
        let (innovations, css) = conditional_residuals(
            &w,
            mu,
            &coefficients.ar_terms(period),
            &coefficients.ma_terms(period),
            start,
        );
        let sigma2 = (css / n_eff as f64).max(MIN_VARIANCE);
        let criteria = InformationCriteria::from_variance(sigma2, n_eff, self.num_params());

        let offset = order.differencing_lag();
        let mut fitted = vec![f64::NAN; values.len()];
        let mut residuals = vec![f64::NAN; values.len()];
        for t in start..w.len() {
            residuals[t + offset] = innovations[t];
            fitted[t + offset] = values[t + offset] - innovations[t];
        }

        trace!(
            order = %order,
            iterations = result.iterations,
            evaluations = result.evaluations,
            "css optimisation finished"
        );
        if !result.converged {
            debug!(order = %order, "optimiser stopped at iteration limit");
        }

        self.state = Some(FittedState {
            coefficients,
            intercept: mu,
            original: values.to_vec(),
            differenced: w,
            innovations,
            fitted,
            residuals,
            sigma2,
            criteria,
            converged: result.converged,
        });
        Ok(())
    }

    fn forecast_mean(&self, state: &FittedState, horizon: usize) -> Vec<f64> {
        let period = self.order.period();
        let ar_terms = state.coefficients.ar_terms(period);
        let ma_terms = state.coefficients.ma_terms(period);

        let n = state.differenced.len();
        let mut w = state.differenced.clone();
        let mut e = state.innovations.clone();
        w.reserve(horizon);
        e.reserve(horizon);
        for _ in 0..horizon {
            let t = w.len();
            let pred = predict_at(t, &w, &e, state.intercept, &ar_terms, &ma_terms);
            w.push(pred);
            e.push(0.0);
        }

        let (_, sd, _) = self.order.seasonal_orders();
        integrate(&w[n..], &state.original, self.order.d, sd, period)
    }

    /// Forecast standard errors from the ψ-weights of the integrated model.
    fn forecast_std_errors(&self, state: &FittedState, horizon: usize) -> Vec<f64> {
        let period = self.order.period();
        let (_, sd, _) = self.order.seasonal_orders();
        let c = &state.coefficients;
        let full_ar = polymul(
            &ar_operator(&c.ar, &c.seasonal_ar, period),
            &differencing_operator(self.order.d, sd, period),
        );
        let ma = ma_operator(&c.ma, &c.seasonal_ma, period);
        let psi = psi_weights(&full_ar, &ma, horizon);

        let mut cumulative = 0.0;
        psi.iter()
            .map(|p| {
                cumulative += p * p;
                (state.sigma2 * cumulative).sqrt()
            })
            .collect()
    }
}

impl Default for SARIMA {
    fn default() -> Self {
        Self::new(ModelOrder::default())
    }
}

impl Forecaster for SARIMA {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        self.fit_values(series.values())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let state = self.state()?;
        if horizon == 0 {
            return Ok(Forecast::new());
        }
        Ok(Forecast::from_values(self.forecast_mean(state, horizon)))
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let state = self.state()?;
        if !(level > 0.0 && level < 1.0) {
            return Err(AnalyzerError::InvalidParameter(format!(
                "interval level must be in (0, 1), got {}",
                level
            )));
        }
        if horizon == 0 {
            return Ok(Forecast::new());
        }

        let point = self.forecast_mean(state, horizon);
        let z = quantile_normal(0.5 + level / 2.0);
        let se = self.forecast_std_errors(state, horizon);
        let lower = point.iter().zip(&se).map(|(p, s)| p - z * s).collect();
        let upper = point.iter().zip(&se).map(|(p, s)| p + z * s).collect();
        Forecast::from_values_with_intervals(point, lower, upper, level)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        if self.order.is_seasonal() {
            "SARIMA"
        } else {
            "ARIMA"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ar1, gaussian_noise, make_timestamps, random_walk};
    use approx::assert_relative_eq;

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::new(make_timestamps(values.len()), values).unwrap()
    }

    #[test]
    fn estimates_ar1_coefficient() {
        let values: Vec<f64> = ar1(500, 0.6, 1).iter().map(|x| x + 20.0).collect();
        let mut model = SARIMA::arima(1, 0, 0);
        model.fit(&series(values.clone())).unwrap();

        assert_relative_eq!(model.ar_coefficients()[0], 0.6, epsilon = 0.1);
        assert_relative_eq!(model.intercept(), 20.0, epsilon = 0.5);
        assert_relative_eq!(model.sigma2().unwrap(), 1.0, epsilon = 0.25);
        assert!(model.converged());
    }

    #[test]
    fn estimates_ma1_coefficient() {
        let e = gaussian_noise(600, 2);
        let values: Vec<f64> = (1..600).map(|t| e[t] + 0.5 * e[t - 1]).collect();
        let mut model = SARIMA::arima(0, 0, 1);
        model.fit(&series(values)).unwrap();

        assert_relative_eq!(model.ma_coefficients()[0], 0.5, epsilon = 0.15);
    }

    #[test]
    fn random_walk_forecast_follows_drift() {
        let values = random_walk(200, 3);
        let drift = (values[199] - values[0]) / 199.0;
        let mut model = SARIMA::arima(0, 1, 0);
        model.fit(&series(values.clone())).unwrap();

        assert_relative_eq!(model.intercept(), drift, epsilon = 1e-9);
        let forecast = model.predict(3).unwrap();
        for h in 0..3 {
            assert_relative_eq!(
                forecast.values()[h],
                values[199] + drift * (h + 1) as f64,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn random_walk_intervals_grow_with_sqrt_horizon() {
        let mut model = SARIMA::arima(0, 1, 0);
        model.fit(&series(random_walk(200, 4))).unwrap();

        let forecast = model.predict_with_intervals(4, 0.95).unwrap();
        let lower = forecast.lower().unwrap();
        let upper = forecast.upper().unwrap();
        let width = |h: usize| upper[h] - lower[h];

        assert_relative_eq!(width(3) / width(0), 2.0, epsilon = 1e-9);
        let sigma = model.sigma2().unwrap().sqrt();
        assert_relative_eq!(width(0), 2.0 * 1.959964 * sigma, epsilon = 1e-4);
        assert_eq!(forecast.level(), Some(0.95));
    }

    #[test]
    fn seasonal_difference_repeats_last_cycle() {
        let pattern = [5.0, -2.0, 1.0, -4.0];
        let noise = gaussian_noise(48, 5);
        let values: Vec<f64> = (0..48)
            .map(|i| 100.0 + pattern[i % 4] + 0.1 * noise[i])
            .collect();
        let mut model = SARIMA::new(ModelOrder::new(0, 0, 0).with_seasonal(0, 1, 0, 4));
        model.fit(&series(values.clone())).unwrap();

        let mu = model.intercept();
        let forecast = model.predict(4).unwrap();
        for h in 0..4 {
            assert_relative_eq!(forecast.values()[h], values[44 + h] + mu, epsilon = 1e-9);
        }
        assert_eq!(model.name(), "SARIMA");
    }

    #[test]
    fn fitted_values_are_aligned_with_input() {
        let values = random_walk(120, 6);
        let mut model = SARIMA::new(ModelOrder::new(1, 1, 1).with_seasonal(1, 0, 0, 4));
        model.fit(&series(values.clone())).unwrap();

        let fitted = model.fitted_values().unwrap();
        let residuals = model.residuals().unwrap();
        assert_eq!(fitted.len(), 120);
        assert_eq!(residuals.len(), 120);

        // d = 1 plus an AR lag of 1 + 4 leaves six burn-in values.
        let burn_in = fitted.iter().take_while(|v| v.is_nan()).count();
        assert_eq!(burn_in, 6);
        for t in burn_in..120 {
            assert_relative_eq!(fitted[t] + residuals[t], values[t], epsilon = 1e-9);
        }
    }

    #[test]
    fn estimates_are_stationary_and_invertible() {
        let values: Vec<f64> = (0..150).map(|i| 1.05f64.powi(i) + (i % 3) as f64).collect();
        let mut model = SARIMA::arima(1, 0, 1);
        model.fit(&series(values)).unwrap();
        assert!(model.ar_coefficients()[0].abs() < 1.0);
        assert!(model.ma_coefficients()[0].abs() < 1.0);
    }

    #[test]
    fn coefficient_names() {
        let mut model = SARIMA::new(ModelOrder::new(1, 0, 1).with_seasonal(1, 0, 1, 4));
        model.fit(&series(ar1(200, 0.4, 8))).unwrap();
        let coefficients = model.coefficients();
        let names: Vec<&str> = coefficients.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["intercept", "ar.L1", "ma.L1", "ar.S.L4", "ma.S.L4", "sigma2"]
        );
        assert_eq!(model.num_params(), 6);
    }

    #[test]
    fn criteria_use_effective_sample() {
        let mut model = SARIMA::arima(2, 1, 0);
        model.fit(&series(random_walk(100, 9))).unwrap();
        let criteria = model.criteria().unwrap();
        assert_eq!(criteria.nobs, 97);
        assert_eq!(criteria.num_params, 4);
        assert!(criteria.aic < criteria.bic);
    }

    #[test]
    fn conditioning_fixes_effective_sample() {
        let values = ar1(150, 0.5, 12);
        let mut short = SARIMA::arima(1, 0, 0).with_conditioning(10);
        short.fit_values(&values).unwrap();
        let mut long = SARIMA::arima(3, 0, 0).with_conditioning(10);
        long.fit_values(&values).unwrap();
        assert_eq!(short.criteria().unwrap().nobs, 140);
        assert_eq!(long.criteria().unwrap().nobs, 140);
        assert_eq!(short.fitted_values().unwrap().iter().filter(|v| v.is_nan()).count(), 10);
    }

    #[test]
    fn rejects_invalid_input() {
        let mut model = SARIMA::arima(2, 1, 1);
        assert!(matches!(
            model.fit(&series(vec![1.0, 2.0, 3.0])),
            Err(AnalyzerError::InsufficientData { .. })
        ));
        assert!(matches!(
            model.fit_values(&[]),
            Err(AnalyzerError::EmptyData)
        ));
        let mut values = random_walk(50, 1);
        values[20] = f64::NAN;
        assert!(matches!(
            model.fit_values(&values),
            Err(AnalyzerError::MissingValues)
        ));
        let mut seasonal = SARIMA::new(ModelOrder::new(0, 0, 0).with_seasonal(1, 0, 0, 1));
        assert!(seasonal.fit_values(&random_walk(50, 1)).is_err());
    }

    #[test]
    fn predict_requires_fit() {
        let model = SARIMA::default();
        assert!(matches!(model.predict(5), Err(AnalyzerError::FitRequired)));
        assert!(!model.is_fitted());
        assert!(model.coefficients().is_empty());
    }

    #[test]
    fn zero_horizon_and_bad_level() {
        let mut model = SARIMA::default();
        model.fit(&series(random_walk(60, 2))).unwrap();
        assert!(model.predict(0).unwrap().is_empty());
        assert!(model.predict_with_intervals(3, 1.5).is_err());
        assert_eq!(model.name(), "ARIMA");
    }

    #[test]
    fn intercept_can_be_disabled() {
        let values: Vec<f64> = ar1(200, 0.5, 3).iter().map(|x| x + 5.0).collect();
        let mut model = SARIMA::arima(1, 0, 0).with_intercept(false);
        model.fit_values(&values).unwrap();
        assert_eq!(model.intercept(), 0.0);
        assert!(!model.coefficients().contains_key("intercept"));
    }
}
