//! End-to-end analysis of one symbol and timeframe.
//!
//! [`run_analysis`] loads and cleans the bars, analyses seasonality, searches
//! and fits an ARIMA model on the training part, scores its forecast on the
//! held-out part and writes the results to the output directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{Correlogram, SeasonalAnalysis, SeasonalAnalyzer, SeriesSummary};
use crate::config::{AnalyzerConfig, MarketHours, SearchSettings};
use crate::core::{Forecast, TimeSeries, Timeframe};
use crate::data::{Bars, DataLoader, DataMetadata, DataRequest};
use crate::error::{AnalyzerError, Result};
use crate::evaluation::{cross_validate, split_by_train_size, CVConfig, CVResults};
use crate::indicators::{add_technical_indicators, DEFAULT_MA_WINDOWS};
use crate::models::arima::{ARIMAAnalyzer, FitSummary, ModelOrder, SARIMA};
use crate::models::Forecaster;
use crate::report::{
    forecast_rows, init_logging, plot_acf_pacf, plot_decomposition, plot_forecast,
    plot_residuals, result_prefix, write_forecast_csv, write_json, ForecastRow, LogLevel,
    OutputPaths,
};

const VOLUME_COLUMN: &str = "tick_volume";

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Share of observations used for training, in (0, 1).
    pub train_size: f64,
    pub output_dir: PathBuf,
    pub log_level: LogLevel,
    /// Search seasonal orders with the timeframe's period.
    pub seasonal: bool,
    pub data_dir: PathBuf,
    pub column: String,
    pub filter_trading: bool,
    /// Cross-validation folds on the training part; 0 disables it.
    pub cv_folds: usize,
    pub confidence_level: f64,
    /// Render PNG charts.
    pub plots: bool,
    pub market: MarketHours,
    pub search: SearchSettings,
    pub default_order: ModelOrder,
}

impl AnalysisOptions {
    /// Options for `symbol`/`timeframe` with every other value from `config`.
    pub fn from_config(config: &AnalyzerConfig, symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        let [p, d, q] = config.default_order;
        Self {
            symbol: symbol.into(),
            timeframe,
            start_date: None,
            end_date: None,
            train_size: config.train_size,
            output_dir: config.results_dir.clone(),
            log_level: LogLevel::default(),
            seasonal: true,
            data_dir: config.data_dir.clone(),
            column: config.default_column.clone(),
            filter_trading: true,
            cv_folds: 0,
            confidence_level: config.confidence_level,
            plots: true,
            market: config.market.clone(),
            search: config.search.clone(),
            default_order: ModelOrder::new(p, d, q),
        }
    }

    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self::from_config(&AnalyzerConfig::default(), symbol, timeframe)
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_train_size(mut self, train_size: f64) -> Self {
        self.train_size = train_size;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_seasonal(mut self, seasonal: bool) -> Self {
        self.seasonal = seasonal;
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn with_trading_filter(mut self, enabled: bool) -> Self {
        self.filter_trading = enabled;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_plots(mut self, plots: bool) -> Self {
        self.plots = plots;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.train_size > 0.0 && self.train_size < 1.0) {
            return Err(AnalyzerError::InvalidParameter(format!(
                "train_size must be in (0, 1), got {}",
                self.train_size
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AnalyzerError::InvalidParameter(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        self.market.validate()
    }

    fn data_request(&self) -> DataRequest {
        DataRequest::new(self.symbol.clone(), self.timeframe)
            .with_dates(self.start_date, self.end_date)
            .with_column(self.column.clone())
            .with_trading_filter(self.filter_trading)
    }
}

/// Everything a run produced.
///
/// The serialised form is the metadata JSON; the forecast table, residuals
/// and saved paths are kept in memory only.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub data: DataMetadata,
    pub summary: SeriesSummary,
    pub seasonality: SeasonalAnalysis,
    pub significant_acf_lags: Vec<usize>,
    pub significant_pacf_lags: Vec<usize>,
    /// Winner of the order search.
    pub search: FitSummary,
    /// Refit of the selected order on the training part.
    pub model: FitSummary,
    pub train_size: usize,
    pub test_size: usize,
    pub confidence_level: f64,
    /// `mse`, `rmse`, `mae` and `mape` on the test part.
    pub metrics: BTreeMap<String, f64>,
    pub cross_validation: Option<CVResults>,
    /// Last finite value of every technical indicator.
    pub latest_indicators: BTreeMap<String, f64>,
    #[serde(skip)]
    pub forecast: Vec<ForecastRow>,
    #[serde(skip)]
    pub residuals: Vec<f64>,
    #[serde(skip)]
    pub saved_files: BTreeMap<String, PathBuf>,
}

impl AnalysisResult {
    pub fn order(&self) -> ModelOrder {
        self.model.order
    }
}

/// Run the complete analysis and save its outputs.
pub fn run_analysis(options: &AnalysisOptions) -> Result<AnalysisResult> {
    init_logging(&options.output_dir, options.log_level)?;
    options.validate()?;
    info!(
        symbol = %options.symbol,
        timeframe = %options.timeframe,
        seasonal = options.seasonal,
        "starting ARIMA analysis"
    );

    let loader = DataLoader::new(&options.data_dir).with_market(options.market.clone());
    let request = options.data_request();
    let loaded = loader.prepare_bars(&request)?;
    let (series, data) = loader.series_from_bars(&loaded, &request)?;
    let summary = SeriesSummary::new(&series, format!("{} {}", options.symbol, options.timeframe));
    info!("series summary\n{}", summary);

    let latest_indicators = latest_indicators(loaded.bars, &options.column);

    let period = options.timeframe.seasonal_period();
    let (seasonality, decomposition) = SeasonalAnalyzer::new(Some(period)).analyze(&series);
    let correlogram = Correlogram::compute(series.values());
    info!(
        period,
        adf_p_value = seasonality.stationarity.adf.p_value,
        stationary = seasonality.stationarity.adf.is_stationary,
        "seasonality analysed"
    );

    let (train, test) = split_by_train_size(&series, options.train_size)?;
    info!(train = train.len(), test = test.len(), "series split");

    let search_config = options.search.to_auto_config(Some(period));
    let mut analyzer = ARIMAAnalyzer::new(options.seasonal, Some(period))
        .with_search_config(search_config)
        .with_default_order(options.default_order);
    let search = analyzer.find_best(&train)?;
    let model = analyzer.fit(&train, None)?;
    let forecast = analyzer.forecast(test.len(), 1.0 - options.confidence_level)?;
    let metrics = analyzer.evaluate(test.values(), forecast.values())?;
    info!(
        mse = metrics.mse,
        rmse = metrics.rmse,
        mae = metrics.mae,
        mape = metrics.mape,
        "forecast evaluated"
    );

    let cross_validation = if options.cv_folds > 0 {
        run_cross_validation(&train, model.order, options.cv_folds, test.len())
    } else {
        None
    };

    let residuals = analyzer
        .model()
        .and_then(|m| m.residuals())
        .map(<[f64]>::to_vec)
        .unwrap_or_default();

    let mut result = AnalysisResult {
        symbol: options.symbol.clone(),
        timeframe: options.timeframe,
        data,
        summary,
        seasonality,
        significant_acf_lags: correlogram.significant_acf_lags(),
        significant_pacf_lags: correlogram.significant_pacf_lags(),
        search,
        model,
        train_size: train.len(),
        test_size: test.len(),
        confidence_level: options.confidence_level,
        metrics: metrics.as_map(),
        cross_validation,
        latest_indicators,
        forecast: forecast_rows(&test, &forecast)?,
        residuals,
        saved_files: BTreeMap::new(),
    };

    let charts = options.plots.then_some(Charts {
        train: &train,
        test: &test,
        forecast: &forecast,
        decomposition: decomposition.as_ref(),
        correlogram: &correlogram,
    });
    result.saved_files = save_results(&result, &options.output_dir, charts)?;
    info!(order = %result.order(), files = result.saved_files.len(), "analysis complete");
    Ok(result)
}

fn latest_indicators(mut bars: Bars, price: &str) -> BTreeMap<String, f64> {
    let base: Vec<String> = bars.column_names();
    if let Err(e) = add_technical_indicators(&mut bars, price, VOLUME_COLUMN, &DEFAULT_MA_WINDOWS) {
        warn!(error = %e, "technical indicators skipped");
        return BTreeMap::new();
    }
    bars.column_names()
        .into_iter()
        .filter(|name| !base.contains(name))
        .filter_map(|name| {
            let last = bars
                .column(&name)?
                .iter()
                .rev()
                .find(|v| v.is_finite())
                .copied()?;
            Some((name, last))
        })
        .collect()
}

fn run_cross_validation(
    train: &TimeSeries,
    order: ModelOrder,
    folds: usize,
    test_len: usize,
) -> Option<CVResults> {
    let horizon = test_len.min(train.len() / (2 * folds)).max(1);
    let outcome = CVConfig::with_folds(train.len(), folds, horizon)
        .and_then(|config| cross_validate(&config, train, || SARIMA::new(order)));
    match outcome {
        Ok(results) => {
            info!(
                folds = results.n_folds,
                rmse = results.aggregated.rmse,
                rmse_std = results.aggregated.rmse_std,
                "cross-validation finished"
            );
            Some(results)
        }
        Err(e) => {
            warn!(error = %e, "cross-validation skipped");
            None
        }
    }
}

struct Charts<'a> {
    train: &'a TimeSeries,
    test: &'a TimeSeries,
    forecast: &'a Forecast,
    decomposition: Option<&'a crate::analysis::Decomposition>,
    correlogram: &'a Correlogram,
}

fn save_results(
    result: &AnalysisResult,
    output_dir: &Path,
    charts: Option<Charts<'_>>,
) -> Result<BTreeMap<String, PathBuf>> {
    let prefix = result_prefix(&result.symbol, result.timeframe, Local::now());
    let paths = OutputPaths::create(output_dir, &prefix)?;
    let mut saved = BTreeMap::new();

    write_forecast_csv(&paths.forecast_table, &result.forecast)?;
    saved.insert("forecast".to_string(), paths.forecast_table.clone());

    if let Some(charts) = charts {
        let title = format!("{} {} {}", result.symbol, result.timeframe, result.order());
        let mut record = |key: &str, path: &PathBuf, outcome: Result<()>| match outcome {
            Ok(()) => {
                saved.insert(key.to_string(), path.clone());
            }
            Err(e) => warn!(chart = key, error = %e, "chart not saved"),
        };
        record(
            "forecast_plot",
            &paths.forecast_plot,
            plot_forecast(&paths.forecast_plot, charts.train, charts.test, charts.forecast, &title),
        );
        record(
            "residuals_plot",
            &paths.residuals_plot,
            plot_residuals(&paths.residuals_plot, &result.residuals, "Model residuals"),
        );
        if let Some(decomposition) = charts.decomposition {
            record(
                "decomposition_plot",
                &paths.decomposition_plot,
                plot_decomposition(&paths.decomposition_plot, decomposition, "Seasonal decomposition"),
            );
        }
        record(
            "acf_pacf_plot",
            &paths.acf_pacf_plot,
            plot_acf_pacf(&paths.acf_pacf_plot, charts.correlogram, "Correlogram"),
        );
    }

    write_json(&paths.metadata, result)?;
    saved.insert("metadata".to_string(), paths.metadata);
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_timestamps;

    #[test]
    fn options_inherit_config_defaults() {
        let mut config = AnalyzerConfig::default();
        config.train_size = 0.7;
        config.default_order = [2, 1, 0];
        let options = AnalysisOptions::from_config(&config, "EURUSD+", Timeframe::H1);
        assert_eq!(options.train_size, 0.7);
        assert_eq!(options.default_order, ModelOrder::new(2, 1, 0));
        assert!(options.seasonal);
        assert_eq!(options.column, "close");

        let request = options.with_trading_filter(false).data_request();
        assert!(!request.filter_trading);
        assert_eq!(request.symbol, "EURUSD+");
    }

    #[test]
    fn invalid_split_is_rejected() {
        let options = AnalysisOptions::new("X", Timeframe::D1).with_train_size(1.0);
        assert!(matches!(
            options.validate(),
            Err(AnalyzerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn latest_indicators_skip_input_columns() {
        let n = 80;
        let mut bars = Bars::new(make_timestamps(n));
        bars.insert_column("close", (0..n).map(|i| 100.0 + (i as f64 * 0.2).sin()).collect())
            .unwrap();
        bars.insert_column(VOLUME_COLUMN, vec![5.0; n]).unwrap();

        let latest = latest_indicators(bars, "close");
        assert!(!latest.contains_key("close"));
        assert!(latest.contains_key("rsi"));
        assert!(latest.contains_key("ma50"));
        // 80 bars are too few for the 100- and 200-bar averages.
        assert!(!latest.contains_key("ma200"));
        assert_eq!(latest.get("volume_ma"), Some(&5.0));
    }
}
