//! ARIMA and SARIMA models.
//!
//! - [`SARIMA`]: conditional-sum-of-squares fit of `(p,d,q)(P,D,Q)[m]` orders
//!   (plain ARIMA when the seasonal part is absent)
//! - [`AutoARIMA`]: differencing tests plus stepwise or grid order search
//! - [`ARIMAAnalyzer`]: search, refit, forecast and scoring in one place

mod analyzer;
mod auto_arima;
mod criteria;
mod diff;
mod model;
mod order;
mod poly;

pub use analyzer::{ARIMAAnalyzer, FitSummary};
pub use auto_arima::{AutoARIMA, AutoARIMAConfig};
pub use criteria::{InformationCriteria, InformationCriterion};
pub use diff::{
    difference, integrate, seasonal_difference, suggest_differencing,
    suggest_seasonal_differencing,
};
pub use model::SARIMA;
pub use order::{ModelOrder, SeasonalOrder};
