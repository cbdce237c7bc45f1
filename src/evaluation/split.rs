//! Chronological train/test splits.

use crate::core::TimeSeries;
use crate::error::{AnalyzerError, Result};

/// Split off the last `test_size` fraction as the test set.
///
/// The training part holds `floor(n * (1 - test_size))` observations.
pub fn train_test_split(series: &TimeSeries, test_size: f64) -> Result<(TimeSeries, TimeSeries)> {
    check_fraction("test_size", test_size)?;
    let train_len = (series.len() as f64 * (1.0 - test_size)).floor() as usize;
    split_at(series, train_len)
}

/// Keep the first `floor(n * train_size)` observations for training.
pub fn split_by_train_size(
    series: &TimeSeries,
    train_size: f64,
) -> Result<(TimeSeries, TimeSeries)> {
    check_fraction("train_size", train_size)?;
    let train_len = (series.len() as f64 * train_size).floor() as usize;
    split_at(series, train_len)
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(AnalyzerError::InvalidParameter(format!(
            "{} must be in (0, 1), got {}",
            name, value
        )));
    }
    Ok(())
}

fn split_at(series: &TimeSeries, train_len: usize) -> Result<(TimeSeries, TimeSeries)> {
    let n = series.len();
    if train_len == 0 || train_len >= n {
        return Err(AnalyzerError::InsufficientData { needed: 2, got: n });
    }
    Ok((series.slice(0, train_len)?, series.slice(train_len, n)?))
}
