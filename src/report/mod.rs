//! Run outputs: logging setup, charts and exported tables.

pub mod export;
pub mod logging;
pub mod plot;

pub use export::{
    forecast_rows, result_prefix, write_forecast_csv, write_json, ForecastRow, OutputPaths,
};
pub use logging::{init_logging, LogLevel, LOG_FILE_NAME};
pub use plot::{plot_acf_pacf, plot_decomposition, plot_forecast, plot_residuals};
