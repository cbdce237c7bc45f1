use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;

use arima_analyzer::config::AnalyzerConfig;
use arima_analyzer::core::Timeframe;
use arima_analyzer::data::parse_date;
use arima_analyzer::pipeline::{run_analysis, AnalysisOptions, AnalysisResult};
use arima_analyzer::report::LogLevel;

/// ARIMA/SARIMA analysis and forecasting of trading-hour price series.
#[derive(Parser, Debug)]
#[command(name = "arima-analyzer", version, about)]
struct Cli {
    /// Instrument symbol, e.g. US.100+ or EURUSD+.
    #[arg(long)]
    symbol: Option<String>,

    /// Bar timeframe: M1, M5, M15, H1, H4 or D1.
    #[arg(long, value_parser = Timeframe::from_str)]
    timeframe: Option<Timeframe>,

    /// Directory for results and the log file.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// First day to analyse (YYYY-MM-DD or DD.MM.YYYY).
    #[arg(long, value_parser = parse_date)]
    start_date: Option<NaiveDate>,

    /// Last day to analyse, inclusive.
    #[arg(long, value_parser = parse_date)]
    end_date: Option<NaiveDate>,

    /// Search non-seasonal orders only.
    #[arg(long)]
    no_seasonal: bool,

    /// Share of observations used for training.
    #[arg(long)]
    train_size: Option<f64>,

    /// DEBUG, INFO, WARNING, ERROR or CRITICAL.
    #[arg(long, default_value = "INFO", value_parser = LogLevel::from_str)]
    log_level: LogLevel,

    /// Root of the historical data tree.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Column to analyse.
    #[arg(long)]
    column: Option<String>,

    /// TOML file overriding the built-in configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep bars outside trading hours.
    #[arg(long)]
    no_trading_filter: bool,

    /// Cross-validation folds on the training part (0 disables).
    #[arg(long, default_value_t = 0)]
    cv_folds: usize,

    /// Skip PNG charts.
    #[arg(long)]
    no_plots: bool,
}

impl Cli {
    fn into_options(self) -> anyhow::Result<AnalysisOptions> {
        let config = match &self.config {
            Some(path) => AnalyzerConfig::from_toml_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => AnalyzerConfig::default(),
        };
        let symbol = self.symbol.unwrap_or_else(|| config.default_symbol.clone());
        let timeframe = self.timeframe.unwrap_or(config.default_timeframe);

        let mut options = AnalysisOptions::from_config(&config, symbol, timeframe)
            .with_dates(self.start_date, self.end_date)
            .with_seasonal(!self.no_seasonal)
            .with_log_level(self.log_level)
            .with_trading_filter(!self.no_trading_filter)
            .with_cv_folds(self.cv_folds)
            .with_plots(!self.no_plots);
        if let Some(dir) = self.output_dir {
            options = options.with_output_dir(dir);
        }
        if let Some(dir) = self.data_dir {
            options = options.with_data_dir(dir);
        }
        if let Some(train_size) = self.train_size {
            options = options.with_train_size(train_size);
        }
        if let Some(column) = self.column {
            options = options.with_column(column);
        }
        Ok(options)
    }
}

fn print_report(result: &AnalysisResult) {
    println!("Analysis of {} {}", result.symbol, result.timeframe);
    println!("  observations: {} (train {}, test {})", result.data.length, result.train_size, result.test_size);
    println!("  model: {}", result.order());
    println!(
        "  AIC {:.2}  BIC {:.2}",
        result.model.criteria.aic, result.model.criteria.bic
    );
    for (name, value) in &result.metrics {
        println!("  {:<5} {:.6}", name, value);
    }
    if let Some(cv) = &result.cross_validation {
        println!(
            "  cross-validation: {} folds, RMSE {:.6} ± {:.6}",
            cv.n_folds, cv.aggregated.rmse, cv.aggregated.rmse_std
        );
    }
    for path in result.saved_files.values() {
        println!("  saved {}", path.display());
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = cli.into_options().and_then(|options| {
        run_analysis(&options).with_context(|| {
            format!("analysis of {} {} failed", options.symbol, options.timeframe)
        })
    });
    match outcome {
        Ok(result) => {
            print_report(&result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_options() {
        let cli = Cli::try_parse_from([
            "arima-analyzer",
            "--symbol",
            "EURUSD+",
            "--timeframe",
            "h1",
            "--start-date",
            "01.02.2024",
            "--no-seasonal",
            "--train-size",
            "0.75",
            "--log-level",
            "WARNING",
            "--cv-folds",
            "3",
        ])
        .unwrap();
        let options = cli.into_options().unwrap();
        assert_eq!(options.symbol, "EURUSD+");
        assert_eq!(options.timeframe, Timeframe::H1);
        assert_eq!(options.start_date, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert!(!options.seasonal);
        assert_eq!(options.train_size, 0.75);
        assert_eq!(options.log_level, LogLevel::Warning);
        assert_eq!(options.cv_folds, 3);
    }

    #[test]
    fn defaults_come_from_config() {
        let options = Cli::try_parse_from(["arima-analyzer"])
            .unwrap()
            .into_options()
            .unwrap();
        assert_eq!(options.symbol, "US.100+");
        assert_eq!(options.timeframe, Timeframe::M1);
        assert_eq!(options.output_dir, PathBuf::from("results"));
        assert!(options.seasonal);
        assert!(options.filter_trading);
    }

    #[test]
    fn unknown_timeframe_is_rejected() {
        assert!(Cli::try_parse_from(["arima-analyzer", "--timeframe", "W1"]).is_err());
    }
}
