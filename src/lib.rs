//! # arima-analyzer
//!
//! ARIMA/SARIMA analysis and forecasting of financial price series exported
//! from a trading terminal.
//!
//! The crate loads bar files, restricts them to trading hours, imputes gaps,
//! analyses seasonality and stationarity, searches (p,d,q)(P,D,Q,m) orders by
//! information criterion, and scores held-out forecasts. [`pipeline::run_analysis`]
//! runs all of it and writes CSV, JSON and PNG outputs.

#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod analysis;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod indicators;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AnalyzerError, Result};

pub mod prelude {
    pub use crate::config::AnalyzerConfig;
    pub use crate::core::{Forecast, TimeSeries, Timeframe};
    pub use crate::error::{AnalyzerError, Result};
    pub use crate::evaluation::{calculate_metrics, ForecastMetrics};
    pub use crate::models::arima::{ARIMAAnalyzer, AutoARIMA, ModelOrder, SARIMA};
    pub use crate::models::Forecaster;
    pub use crate::pipeline::{run_analysis, AnalysisOptions, AnalysisResult};
}
