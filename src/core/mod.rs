//! Core data structures: series, forecasts and timeframes.

mod forecast;
mod time_series;
mod timeframe;

pub use forecast::Forecast;
pub(crate) use time_series::interpolate_series;
pub use time_series::{MissingValuePolicy, TimeSeries};
pub use timeframe::Timeframe;
