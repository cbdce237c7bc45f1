//! Writing run results: JSON metadata and the forecast table.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;
use tracing::info;

use crate::core::{Forecast, TimeSeries, Timeframe};
use crate::error::{AnalyzerError, Result};

/// File-name prefix `{symbol}_{timeframe}_{YYYYmmdd_HHMMSS}` for one run.
pub fn result_prefix(symbol: &str, timeframe: Timeframe, at: DateTime<Local>) -> String {
    format!("{}_{}_{}", symbol, timeframe, at.format("%Y%m%d_%H%M%S"))
}

/// One held-out observation next to its forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    /// Bar time in the market timezone.
    pub time: DateTime<FixedOffset>,
    pub actual: f64,
    pub forecast: f64,
    pub forecast_lower: Option<f64>,
    pub forecast_upper: Option<f64>,
}

/// Align a forecast with the test series it predicts.
pub fn forecast_rows(test: &TimeSeries, forecast: &Forecast) -> Result<Vec<ForecastRow>> {
    if forecast.horizon() != test.len() {
        return Err(AnalyzerError::DimensionMismatch {
            expected: test.len(),
            got: forecast.horizon(),
        });
    }
    let bound = |b: Option<&[f64]>, i: usize| b.map(|v| v[i]);
    Ok(test
        .local_timestamps()
        .into_iter()
        .enumerate()
        .map(|(i, ts)| ForecastRow {
            time: ts.fixed_offset(),
            actual: test.values()[i],
            forecast: forecast.values()[i],
            forecast_lower: bound(forecast.lower(), i),
            forecast_upper: bound(forecast.upper(), i),
        })
        .collect())
}

/// Write rows as CSV with a header (`time,actual,forecast,forecast_lower,forecast_upper`).
pub fn write_forecast_csv(path: &Path, rows: &[ForecastRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = rows.len(), "forecast table saved");
    Ok(())
}

/// Pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    info!(path = %path.display(), "metadata saved");
    Ok(())
}

/// Output paths for one run under `output_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub metadata: PathBuf,
    pub forecast_table: PathBuf,
    pub forecast_plot: PathBuf,
    pub residuals_plot: PathBuf,
    pub decomposition_plot: PathBuf,
    pub acf_pacf_plot: PathBuf,
}

impl OutputPaths {
    /// Paths sharing `prefix`; creates `output_dir` if needed.
    pub fn create(output_dir: &Path, prefix: &str) -> Result<Self> {
        fs::create_dir_all(output_dir)?;
        let file = |suffix: &str| output_dir.join(format!("{}_{}", prefix, suffix));
        Ok(Self {
            metadata: file("metadata.json"),
            forecast_table: file("forecast.csv"),
            forecast_plot: file("forecast.png"),
            residuals_plot: file("residuals.png"),
            decomposition_plot: file("decomposition.png"),
            acf_pacf_plot: file("acf_pacf.png"),
        })
    }
}
