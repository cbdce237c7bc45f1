//! Static analyzer settings, overridable from a TOML file.
//!
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```toml
//! data_dir = "data/historical"
//! default_symbol = "EURUSD+"
//!
//! [market]
//! open_hour = 8
//! close_hour = 16
//!
//! [search]
//! criterion = "bic"
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::core::Timeframe;
use crate::error::{AnalyzerError, Result};
use crate::models::arima::{AutoARIMAConfig, InformationCriterion};

/// Top-level analyzer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Root of the historical data tree (`{data_dir}/{symbol}/{timeframe}/`).
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub default_symbol: String,
    pub default_timeframe: Timeframe,
    /// Price column analysed when none is given.
    pub default_column: String,
    /// Share of observations used for training.
    pub train_size: f64,
    /// Order used when no search is run.
    pub default_order: [usize; 3],
    /// Prediction interval level.
    pub confidence_level: f64,
    pub market: MarketHours,
    pub search: SearchSettings,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/historical"),
            results_dir: PathBuf::from("results"),
            default_symbol: "US.100+".to_string(),
            default_timeframe: Timeframe::M1,
            default_column: "close".to_string(),
            train_size: 0.8,
            default_order: [1, 1, 1],
            confidence_level: 0.95,
            market: MarketHours::default(),
            search: SearchSettings::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: AnalyzerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnalyzerError::DataNotFound(path.to_path_buf()));
        }
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<()> {
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
}

/// Exchange session in the market's local timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketHours {
    pub timezone: Tz,
    /// First trading hour (inclusive).
    pub open_hour: u32,
    /// Closing hour (exclusive).
    pub close_hour: u32,
    pub trading_days: Vec<Weekday>,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Warsaw,
            open_hour: 9,
            close_hour: 17,
            trading_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }
}

/// Opening and closing instants of one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketSession {
    pub open: DateTime<Tz>,
    pub close: DateTime<Tz>,
}

impl MarketHours {
    pub fn validate(&self) -> Result<()> {
        if self.open_hour >= self.close_hour || self.close_hour > 24 {
            return Err(AnalyzerError::InvalidParameter(format!(
                "market hours must satisfy open < close <= 24, got {}..{}",
                self.open_hour, self.close_hour
            )));
        }
        Ok(())
    }

    /// Bar length of a trading session in hours.
    pub fn session_hours(&self) -> u32 {
        self.close_hour - self.open_hour
    }

    pub fn is_trading_day(&self, weekday: Weekday) -> bool {
        self.trading_days.contains(&weekday)
    }

    /// Whether the market is open at `dt`; the instant is converted to the market timezone.
    pub fn is_open<T: TimeZone>(&self, dt: &DateTime<T>) -> bool {
        let local = dt.with_timezone(&self.timezone);
        self.is_trading_day(local.weekday())
            && local.hour() >= self.open_hour
            && local.hour() < self.close_hour
    }

    /// Open and close instants for `date` in the market timezone.
    pub fn session(&self, date: NaiveDate) -> Result<MarketSession> {
        let at = |hour: u32| -> Result<DateTime<Tz>> {
            let naive = date.and_hms_opt(hour % 24, 0, 0).ok_or_else(|| {
                AnalyzerError::InvalidParameter(format!("invalid market hour {}", hour))
            })?;
            let local = self
                .timezone
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(|| {
                    AnalyzerError::TimestampError(format!(
                        "{} does not exist in {}",
                        naive, self.timezone
                    ))
                })?;
            // A 24:00 close rolls over to midnight of the next day.
            Ok(if hour == 24 {
                local + chrono::Duration::days(1)
            } else {
                local
            })
        };

        Ok(MarketSession {
            open: at(self.open_hour)?,
            close: at(self.close_hour)?,
        })
    }
}

/// Limits and criterion for the automatic order search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    #[serde(rename = "max_seasonal_p")]
    pub max_cap_p: usize,
    #[serde(rename = "max_seasonal_d")]
    pub max_cap_d: usize,
    #[serde(rename = "max_seasonal_q")]
    pub max_cap_q: usize,
    pub stepwise: bool,
    pub criterion: InformationCriterion,
    /// Log every evaluated candidate.
    pub trace: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let defaults = AutoARIMAConfig::default();
        Self {
            max_p: defaults.max_p,
            max_d: defaults.max_d,
            max_q: defaults.max_q,
            max_cap_p: defaults.max_cap_p,
            max_cap_d: defaults.max_cap_d,
            max_cap_q: defaults.max_cap_q,
            stepwise: defaults.stepwise,
            criterion: defaults.criterion,
            trace: true,
        }
    }
}

impl SearchSettings {
    /// Search configuration for a run; `seasonal_period` of `None` disables seasonal terms.
    pub fn to_auto_config(&self, seasonal_period: Option<usize>) -> AutoARIMAConfig {
        let mut config = AutoARIMAConfig::default()
            .with_max_orders(self.max_p, self.max_d, self.max_q)
            .with_seasonal_orders(self.max_cap_p, self.max_cap_d, self.max_cap_q)
            .with_criterion(self.criterion)
            .with_trace(self.trace);
        config = match seasonal_period {
            Some(m) => config.with_seasonal_period(m),
            None => config.non_seasonal(),
        };
        if !self.stepwise {
            config = config.exhaustive();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_market_conventions() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.default_symbol, "US.100+");
        assert_eq!(config.default_timeframe, Timeframe::M1);
        assert_eq!(config.default_column, "close");
        assert_eq!(config.default_order, [1, 1, 1]);
        assert_eq!(config.market.open_hour, 9);
        assert_eq!(config.market.close_hour, 17);
        assert_eq!(config.market.trading_days.len(), 5);
        assert_eq!(config.market.timezone, chrono_tz::Europe::Warsaw);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config = AnalyzerConfig::from_toml_str(
            r#"
            default_symbol = "EURUSD+"
            train_size = 0.7

            [market]
            open_hour = 8
            trading_days = ["Mon", "Tue"]

            [search]
            criterion = "bic"
            max_seasonal_p = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.default_symbol, "EURUSD+");
        assert_eq!(config.train_size, 0.7);
        assert_eq!(config.market.open_hour, 8);
        assert_eq!(config.market.close_hour, 17);
        assert_eq!(config.market.trading_days, vec![Weekday::Mon, Weekday::Tue]);
        assert_eq!(config.search.criterion, InformationCriterion::Bic);
        assert_eq!(config.search.max_cap_p, 1);
        assert_eq!(config.default_column, "close");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            AnalyzerConfig::from_toml_str("train_size = 1.5"),
            Err(AnalyzerError::InvalidParameter(_))
        ));
        assert!(matches!(
            AnalyzerConfig::from_toml_str("[market]\nopen_hour = 18"),
            Err(AnalyzerError::InvalidParameter(_))
        ));
        assert!(matches!(
            AnalyzerConfig::from_toml_str("train_size = \"big\""),
            Err(AnalyzerError::Config(_))
        ));
    }

    #[test]
    fn market_open_respects_timezone_and_weekdays() {
        let hours = MarketHours::default();
        let tz = chrono_tz::Europe::Warsaw;

        // Wednesday 2024-01-10
        let open = tz.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
        let last_minute = tz.with_ymd_and_hms(2024, 1, 10, 16, 59, 0).unwrap();
        let closed = tz.with_ymd_and_hms(2024, 1, 10, 17, 0, 0).unwrap();
        let early = tz.with_ymd_and_hms(2024, 1, 10, 8, 59, 0).unwrap();
        let saturday = tz.with_ymd_and_hms(2024, 1, 13, 12, 0, 0).unwrap();

        assert!(hours.is_open(&open));
        assert!(hours.is_open(&last_minute));
        assert!(!hours.is_open(&closed));
        assert!(!hours.is_open(&early));
        assert!(!hours.is_open(&saturday));

        // 08:30 UTC is 09:30 in Warsaw during winter.
        let utc = chrono::Utc.with_ymd_and_hms(2024, 1, 10, 8, 30, 0).unwrap();
        assert!(hours.is_open(&utc));
    }

    #[test]
    fn session_spans_open_to_close() {
        let hours = MarketHours::default();
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let session = hours.session(date).unwrap();
        assert_eq!(session.open.format("%H:%M").to_string(), "09:00");
        assert_eq!(session.close.format("%H:%M").to_string(), "17:00");
        assert_eq!((session.close - session.open).num_hours(), 8);
        assert_eq!(hours.session_hours(), 8);
    }

    #[test]
    fn search_settings_build_auto_config() {
        let settings = SearchSettings::default();
        let seasonal = settings.to_auto_config(Some(8));
        assert_eq!(seasonal.seasonal_period, 8);
        let plain = settings.to_auto_config(None);
        assert_eq!(plain.seasonal_period, 0);
        assert_eq!(plain.max_cap_d, 0);
    }
}
