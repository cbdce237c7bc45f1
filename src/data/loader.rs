//! Loading bar exports from the historical data tree.
//!
//! Files live at `{data_dir}/{symbol}/{timeframe}/{symbol}_{timeframe}.csv`
//! (or `{symbol}1.csv` in the same directory) and carry a `time` column
//! followed by numeric columns such as `open`, `high`, `low`, `close` and
//! `tick_volume`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MarketHours;
use crate::core::{TimeSeries, Timeframe};
use crate::data::bars::Bars;
use crate::data::dates::parse_timestamp;
use crate::error::{AnalyzerError, Result};

const TIME_COLUMN: &str = "time";

/// What to load and how to prepare it.
#[derive(Debug, Clone)]
pub struct DataRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// First local day to keep.
    pub start_date: Option<NaiveDate>,
    /// Last local day to keep, through 23:59:59.
    pub end_date: Option<NaiveDate>,
    pub column: String,
    /// Keep only bars inside the trading session (ignored for D1).
    pub filter_trading: bool,
}

impl DataRequest {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            start_date: None,
            end_date: None,
            column: "close".to_string(),
            filter_trading: true,
        }
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
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
}

/// Bars read from one file.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub bars: Bars,
    pub path: PathBuf,
    /// Rows dropped because an earlier row had the same timestamp.
    pub duplicates: usize,
}

/// A run of missing bars inside one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    /// Last bar before the gap.
    pub after: DateTime<Utc>,
    /// First bar after the gap.
    pub before: DateTime<Utc>,
    pub missing_bars: i64,
}

/// Provenance and cleaning statistics of a prepared series.
#[derive(Debug, Clone, Serialize)]
pub struct DataMetadata {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub source: PathBuf,
    /// First and last bar in the market timezone.
    pub start_date: Option<DateTime<FixedOffset>>,
    pub end_date: Option<DateTime<FixedOffset>>,
    pub length: usize,
    pub column: String,
    pub imputed_values: usize,
    pub gaps: usize,
    pub duplicates: usize,
}

/// Reads and cleans bar files.
#[derive(Debug, Clone)]
pub struct DataLoader {
    data_dir: PathBuf,
    market: MarketHours,
}

impl DataLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        info!(data_dir = %data_dir.display(), "data loader initialised");
        Self {
            data_dir,
            market: MarketHours::default(),
        }
    }

    pub fn with_market(mut self, market: MarketHours) -> Self {
        self.market = market;
        self
    }

    pub fn market(&self) -> &MarketHours {
        &self.market
    }

    /// Path of the export for `symbol`/`timeframe`.
    pub fn resolve_path(&self, symbol: &str, timeframe: Timeframe) -> Result<PathBuf> {
        let dir = self.data_dir.join(symbol).join(timeframe.as_str());
        let primary = dir.join(format!("{}_{}.csv", symbol, timeframe));
        if primary.exists() {
            return Ok(primary);
        }
        let fallback = dir.join(format!("{}1.csv", symbol));
        if fallback.exists() {
            return Ok(fallback);
        }
        Err(AnalyzerError::DataNotFound(primary))
    }

    /// Load a symbol's bars, restricted to the inclusive local date range.
    pub fn load_data(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<LoadedBars> {
        let path = self.resolve_path(symbol, timeframe)?;
        info!(path = %path.display(), "loading bars");
        let (bars, duplicates) = read_bars(&path)?;
        if duplicates > 0 {
            warn!(duplicates, "dropped rows with duplicate timestamps");
        }
        let bars = self.filter_dates(&bars, start_date, end_date)?;
        info!(rows = bars.len(), "bars imported");
        Ok(LoadedBars {
            bars,
            path,
            duplicates,
        })
    }

    /// Keep bars from local midnight of `start` through 23:59:59 of `end`.
    pub fn filter_dates(
        &self,
        bars: &Bars,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Bars> {
        let tz = self.market.timezone;
        let lower = start
            .map(|d| local_instant(tz, d, NaiveTime::MIN))
            .transpose()?;
        let upper = end
            .map(|d| local_instant(tz, d, end_of_day()))
            .transpose()?;
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo > hi {
                return Err(AnalyzerError::InvalidParameter(format!(
                    "start date {} is after end date {}",
                    lo, hi
                )));
            }
        }
        Ok(bars.filter(|ts| lower.map_or(true, |lo| *ts >= lo) && upper.map_or(true, |hi| *ts <= hi)))
    }

    /// Keep bars on trading days inside `[open, close)` local time.
    pub fn filter_trading_hours(&self, bars: &Bars) -> Bars {
        let kept = bars.filter(|ts| self.market.is_open(ts));
        debug!(before = bars.len(), after = kept.len(), "trading-hour filter");
        kept
    }

    /// Missing bars between consecutive observations of the same session.
    ///
    /// Intraday sessions are local calendar days; daily bars group by ISO week.
    pub fn detect_gaps(&self, timestamps: &[DateTime<Utc>], timeframe: Timeframe) -> Vec<Gap> {
        let step = timeframe.bar_duration();
        let tz = self.market.timezone;
        timestamps
            .windows(2)
            .filter_map(|w| {
                let (a, b) = (w[0].with_timezone(&tz), w[1].with_timezone(&tz));
                let same_session = if timeframe.is_intraday() {
                    a.date_naive() == b.date_naive()
                } else {
                    a.iso_week() == b.iso_week()
                };
                let spacing = w[1] - w[0];
                (same_session && spacing > step).then(|| Gap {
                    after: w[0],
                    before: w[1],
                    missing_bars: spacing.num_seconds() / step.num_seconds() - 1,
                })
            })
            .collect()
    }

    /// Load a request's bars and apply the trading-hour filter.
    pub fn prepare_bars(&self, request: &DataRequest) -> Result<LoadedBars> {
        let loaded = self.load_data(
            &request.symbol,
            request.timeframe,
            request.start_date,
            request.end_date,
        )?;
        let bars = if request.filter_trading && request.timeframe.is_intraday() {
            self.filter_trading_hours(&loaded.bars)
        } else {
            loaded.bars
        };
        if bars.is_empty() {
            return Err(AnalyzerError::EmptyData);
        }
        Ok(LoadedBars { bars, ..loaded })
    }

    /// Select the request's column from prepared bars and impute it.
    pub fn series_from_bars(
        &self,
        loaded: &LoadedBars,
        request: &DataRequest,
    ) -> Result<(TimeSeries, DataMetadata)> {
        let raw = loaded
            .bars
            .to_series(&request.column, self.market.timezone)?;
        let imputed_values = raw.missing_count();
        if imputed_values == raw.len() {
            return Err(AnalyzerError::MissingValues);
        }
        if imputed_values > 0 {
            warn!(count = imputed_values, "interpolating missing values");
        }
        let mut series = raw.interpolated(true);
        series.set_metadata("symbol", request.symbol.clone());
        series.set_metadata("timeframe", request.timeframe.as_str());

        let gaps = self.detect_gaps(series.timestamps(), request.timeframe);
        if !gaps.is_empty() {
            let missing: i64 = gaps.iter().map(|g| g.missing_bars).sum();
            warn!(gaps = gaps.len(), missing_bars = missing, "gaps inside trading sessions");
        }

        let local = |ts: DateTime<Utc>| ts.with_timezone(&self.market.timezone).fixed_offset();
        let metadata = DataMetadata {
            symbol: request.symbol.clone(),
            timeframe: request.timeframe,
            source: loaded.path.clone(),
            start_date: series.first_timestamp().map(local),
            end_date: series.last_timestamp().map(local),
            length: series.len(),
            column: request.column.clone(),
            imputed_values,
            gaps: gaps.len(),
            duplicates: loaded.duplicates,
        };
        Ok((series, metadata))
    }

    /// Load, filter, select a column and impute it.
    pub fn prepare_data(&self, request: &DataRequest) -> Result<(TimeSeries, DataMetadata)> {
        info!(symbol = %request.symbol, timeframe = %request.timeframe, "preparing data");
        let loaded = self.prepare_bars(request)?;
        self.series_from_bars(&loaded, request)
    }
}

/// Parse a bar CSV. Unparsable numeric cells become NaN.
pub fn read_bars(path: &Path) -> Result<(Bars, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let time_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(TIME_COLUMN))
        .ok_or_else(|| AnalyzerError::ColumnNotFound {
            column: TIME_COLUMN.to_string(),
            available: headers.iter().map(String::from).collect(),
        })?;
    let names: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != time_idx)
        .map(|(_, h)| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let raw_time = record.get(time_idx).unwrap_or_default();
        let ts = parse_timestamp(raw_time).map_err(|e| {
            AnalyzerError::TimestampError(format!("row {}: {}", line + 2, e))
        })?;
        let values = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != time_idx)
            .map(|(_, cell)| cell.parse::<f64>().unwrap_or(f64::NAN))
            .collect();
        rows.push((ts, values));
    }
    Ok(Bars::from_rows(names, rows))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            AnalyzerError::TimestampError(format!("{} {} does not exist in {}", date, time, tz))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Timelike};
    use std::fs;
    use tempfile::TempDir;

    fn write_export(dir: &Path, symbol: &str, tf: &str, file: &str, body: &str) {
        let folder = dir.join(symbol).join(tf);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(file), body).unwrap();
    }

    /// Hourly bars (UTC) for the first full week of January 2024, with the
    /// close of bar `blank` left empty.
    fn hourly_export_with_blank(blank: Option<i64>) -> String {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut body = String::from("time,open,high,low,close,tick_volume\n");
        for i in 0..24 * 7 {
            let ts = start + Duration::hours(i);
            let close = 100.0 + i as f64 * 0.1;
            let close_cell = if Some(i) == blank {
                String::new()
            } else {
                close.to_string()
            };
            body.push_str(&format!(
                "{},{},{},{},{},{}\n",
                ts.format("%Y.%m.%d %H:%M"),
                close - 0.05,
                close + 0.2,
                close - 0.2,
                close_cell,
                10 + i
            ));
        }
        body
    }

    fn hourly_export() -> String {
        hourly_export_with_blank(None)
    }

    #[test]
    fn resolves_primary_and_fallback_names() {
        let dir = TempDir::new().unwrap();
        write_export(dir.path(), "EURUSD+", "H1", "EURUSD+1.csv", "time,close\n");
        let loader = DataLoader::new(dir.path());
        let path = loader.resolve_path("EURUSD+", Timeframe::H1).unwrap();
        assert!(path.ends_with("EURUSD+1.csv"));

        write_export(dir.path(), "EURUSD+", "H1", "EURUSD+_H1.csv", "time,close\n");
        let path = loader.resolve_path("EURUSD+", Timeframe::H1).unwrap();
        assert!(path.ends_with("EURUSD+_H1.csv"));

        match loader.resolve_path("GOLD", Timeframe::M5) {
            Err(AnalyzerError::DataNotFound(p)) => assert!(p.ends_with("GOLD_M5.csv")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn reads_unsorted_rows_with_duplicates_and_blanks() {
        let dir = TempDir::new().unwrap();
        write_export(
            dir.path(),
            "US.100+",
            "M1",
            "US.100+_M1.csv",
            "time,close,tick_volume\n\
             2024.01.02 10:02,3,1\n\
             2024.01.02 10:00,1,1\n\
             2024.01.02 10:01,,1\n\
             2024.01.02 10:02,4,1\n",
        );
        let loader = DataLoader::new(dir.path());
        let loaded = loader.load_data("US.100+", Timeframe::M1, None, None).unwrap();
        assert_eq!(loaded.duplicates, 1);
        let close = loaded.bars.column("close").unwrap();
        assert_eq!(close.len(), 3);
        assert_eq!(close[0], 1.0);
        assert!(close[1].is_nan());
        assert_eq!(close[2], 4.0);
    }

    #[test]
    fn missing_time_column_is_reported() {
        let dir = TempDir::new().unwrap();
        write_export(dir.path(), "X", "D1", "X_D1.csv", "date,close\n2024-01-01,1\n");
        let loader = DataLoader::new(dir.path());
        assert!(matches!(
            loader.load_data("X", Timeframe::D1, None, None),
            Err(AnalyzerError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn date_filter_is_inclusive_in_local_time() {
        let dir = TempDir::new().unwrap();
        write_export(dir.path(), "S", "H1", "S_H1.csv", &hourly_export());
        let loader = DataLoader::new(dir.path());
        let day = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let loaded = loader.load_data("S", Timeframe::H1, Some(day), Some(day)).unwrap();

        // 2024-01-03 in Warsaw (UTC+1) spans 2024-01-02 23:00 to 2024-01-03 22:00 UTC.
        assert_eq!(loaded.bars.len(), 24);
        let first = loaded.bars.timestamps()[0];
        assert_eq!(first, Utc.with_ymd_and_hms(2024, 1, 2, 23, 0, 0).unwrap());
    }

    #[test]
    fn trading_filter_keeps_session_bars() {
        let dir = TempDir::new().unwrap();
        write_export(dir.path(), "S", "H1", "S_H1.csv", &hourly_export());
        let loader = DataLoader::new(dir.path());
        let loaded = loader.load_data("S", Timeframe::H1, None, None).unwrap();
        let kept = loader.filter_trading_hours(&loaded.bars);

        // Mon 1 Jan to Fri 5 Jan, eight bars per session; the weekend is dropped.
        assert_eq!(kept.len(), 5 * 8);
        let tz = loader.market().timezone;
        for ts in kept.timestamps() {
            let local = ts.with_timezone(&tz);
            assert!((9..17).contains(&local.hour()));
            assert!(local.weekday().num_days_from_monday() < 5);
        }
    }

    #[test]
    fn prepare_data_imputes_and_reports() {
        let dir = TempDir::new().unwrap();
        // 2024-01-02 10:00 UTC is 11:00 in Warsaw, inside the session.
        let body = hourly_export_with_blank(Some(34));
        write_export(dir.path(), "S", "H1", "S_H1.csv", &body);
        let loader = DataLoader::new(dir.path());

        let request = DataRequest::new("S", Timeframe::H1);
        let (series, meta) = loader.prepare_data(&request).unwrap();
        assert_eq!(series.len(), 40);
        assert_eq!(series.missing_count(), 0);
        assert_eq!(meta.imputed_values, 1);
        assert_eq!(meta.length, 40);
        assert_eq!(meta.gaps, 0);
        assert_eq!(meta.column, "close");
        assert_eq!(series.metadata().get("symbol").map(String::as_str), Some("S"));
        assert_eq!(meta.start_date.unwrap().format("%H:%M").to_string(), "09:00");

        let unfiltered = loader
            .prepare_data(&request.clone().with_trading_filter(false))
            .unwrap();
        assert_eq!(unfiltered.0.len(), 24 * 7);

        let bad = request.with_column("vwap");
        assert!(matches!(
            loader.prepare_data(&bad),
            Err(AnalyzerError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn gaps_are_counted_within_sessions_only() {
        let loader = DataLoader::new("unused");
        let tz = loader.market().timezone;
        let at = |d: u32, h: u32| tz.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap().with_timezone(&Utc);
        let stamps = vec![at(2, 9), at(2, 10), at(2, 13), at(2, 16), at(3, 9)];
        let gaps = loader.detect_gaps(&stamps, Timeframe::H1);
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].missing_bars, 2);
        assert_eq!(gaps[1].missing_bars, 2);
    }
}
