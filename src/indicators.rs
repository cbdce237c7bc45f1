//! Technical indicators on price and volume columns.
//!
//! Every indicator returns a vector aligned with its input; positions without
//! enough history hold NaN.

use std::str::FromStr;

use crate::data::Bars;
use crate::error::{AnalyzerError, Result};
use crate::utils::stats::{rolling_mean, rolling_std};

/// Moving-average windows used by [`add_technical_indicators`].
pub const DEFAULT_MA_WINDOWS: [usize; 6] = [5, 10, 20, 50, 100, 200];

/// Trading days per year used to annualise volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnMethod {
    #[default]
    Log,
    Simple,
}

impl FromStr for ReturnMethod {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "simple" => Ok(Self::Simple),
            other => Err(AnalyzerError::InvalidParameter(format!(
                "unknown return method '{}', use 'log' or 'simple'",
                other
            ))),
        }
    }
}

/// Period-over-period returns; one shorter than `prices`.
pub fn returns(prices: &[f64], method: ReturnMethod) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| match method {
            ReturnMethod::Log => (w[1] / w[0]).ln(),
            ReturnMethod::Simple => w[1] / w[0] - 1.0,
        })
        .collect()
}

/// Rolling standard deviation of log returns, aligned with [`returns`].
pub fn volatility(prices: &[f64], window: usize, annualize: bool) -> Vec<f64> {
    let scale = if annualize {
        TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        1.0
    };
    rolling_std(&returns(prices, ReturnMethod::Log), window)
        .into_iter()
        .map(|v| v * scale)
        .collect()
}

/// Exponential moving average with `alpha = 2 / (span + 1)`, seeded with the
/// first finite value.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut state: Option<f64> = None;
    values
        .iter()
        .map(|&x| {
            if x.is_finite() {
                let next = match state {
                    Some(prev) => alpha * x + (1.0 - alpha) * prev,
                    None => x,
                };
                state = Some(next);
            }
            state.unwrap_or(f64::NAN)
        })
        .collect()
}

/// Relative strength index from `period`-bar average gains and losses.
pub fn rsi(prices: &[f64], period: usize) -> Vec<f64> {
    let mut gains = vec![f64::NAN; prices.len()];
    let mut losses = vec![f64::NAN; prices.len()];
    for i in 1..prices.len() {
        let delta = prices[i] - prices[i - 1];
        gains[i] = delta.max(0.0);
        losses[i] = (-delta).max(0.0);
    }
    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| {
            if g.is_nan() || l.is_nan() || (g == 0.0 && l == 0.0) {
                f64::NAN
            } else if l == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + g / l)
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Macd {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD line `EMA(fast) - EMA(slow)`, its `signal`-span EMA and the histogram.
pub fn macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let line: Vec<f64> = ema(prices, fast)
        .iter()
        .zip(ema(prices, slow))
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&line, signal);
    let histogram = line.iter().zip(&signal_line).map(|(m, s)| m - s).collect();
    Macd {
        macd: line,
        signal: signal_line,
        histogram,
    }
}

#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub middle: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Rolling mean plus and minus `num_std` rolling sample deviations.
pub fn bollinger_bands(prices: &[f64], window: usize, num_std: f64) -> BollingerBands {
    let middle = rolling_mean(prices, window);
    let std = rolling_std(prices, window);
    let upper = middle.iter().zip(&std).map(|(m, s)| m + num_std * s).collect();
    let lower = middle.iter().zip(&std).map(|(m, s)| m - num_std * s).collect();
    BollingerBands {
        middle,
        upper,
        lower,
    }
}

/// Append moving averages, RSI(14), MACD(12, 26, 9), Bollinger(20, 2) and,
/// when `volume` exists, its 20-bar average as new columns of `bars`.
pub fn add_technical_indicators(
    bars: &mut Bars,
    price: &str,
    volume: &str,
    windows: &[usize],
) -> Result<()> {
    let prices = bars.require_column(price)?.to_vec();

    for &window in windows {
        bars.insert_column(format!("ma{}", window), rolling_mean(&prices, window))?;
    }
    bars.insert_column("rsi", rsi(&prices, 14))?;

    let m = macd(&prices, 12, 26, 9);
    bars.insert_column("macd", m.macd)?;
    bars.insert_column("macd_signal", m.signal)?;
    bars.insert_column("macd_hist", m.histogram)?;

    let bb = bollinger_bands(&prices, 20, 2.0);
    bars.insert_column("bb_middle", bb.middle)?;
    bars.insert_column("bb_upper", bb.upper)?;
    bars.insert_column("bb_lower", bb.lower)?;

    if let Some(vol) = bars.column(volume) {
        let volume_ma = rolling_mean(vol, 20);
        bars.insert_column("volume_ma", volume_ma)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_timestamps;
    use approx::assert_relative_eq;

    #[test]
    fn log_and_simple_returns() {
        let prices = [100.0, 110.0, 99.0];
        let simple = returns(&prices, ReturnMethod::Simple);
        assert_relative_eq!(simple[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(simple[1], -0.1, epsilon = 1e-12);
        let log = returns(&prices, ReturnMethod::Log);
        assert_relative_eq!(log[0], 1.1f64.ln(), epsilon = 1e-12);
        assert_eq!("Simple".parse::<ReturnMethod>().unwrap(), ReturnMethod::Simple);
        assert!("pct".parse::<ReturnMethod>().is_err());
    }

    #[test]
    fn volatility_is_scaled_by_root_252() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i % 3) as f64).collect();
        let raw = volatility(&prices, 21, false);
        let annual = volatility(&prices, 21, true);
        assert_eq!(raw.len(), 39);
        assert!(raw[19].is_nan());
        assert_relative_eq!(annual[30], raw[30] * 252f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn ema_recursion() {
        let out = ema(&[1.0, 2.0, 3.0], 3);
        assert_relative_eq!(out[0], 1.0);
        assert_relative_eq!(out[1], 1.5);
        assert_relative_eq!(out[2], 2.25);
    }

    #[test]
    fn rsi_extremes() {
        let rising: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let values = rsi(&rising, 14);
        assert!(values[13].is_nan());
        assert_relative_eq!(values[14], 100.0);

        let zigzag: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        let values = rsi(&zigzag, 14);
        assert_relative_eq!(values[20], 50.0, epsilon = 1e-9);
        assert!(rsi(&[5.0; 20], 14)[19].is_nan());
    }

    #[test]
    fn macd_of_constant_prices_is_flat() {
        let m = macd(&[50.0; 40], 12, 26, 9);
        assert!(m.macd.iter().all(|v| v.abs() < 1e-12));
        assert!(m.histogram.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn bollinger_bands_are_symmetric() {
        let prices: Vec<f64> = (0..30).map(|i| (i as f64 * 0.7).sin() + 10.0).collect();
        let bb = bollinger_bands(&prices, 20, 2.0);
        assert!(bb.upper[18].is_nan());
        let half = bb.upper[25] - bb.middle[25];
        assert!(half > 0.0);
        assert_relative_eq!(bb.middle[25] - bb.lower[25], half, epsilon = 1e-12);
    }

    #[test]
    fn indicators_are_added_as_columns() {
        let n = 60;
        let close: Vec<f64> = (0..n).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
        let mut bars = Bars::new(make_timestamps(n));
        bars.insert_column("close", close).unwrap();
        bars.insert_column("tick_volume", vec![10.0; n]).unwrap();

        add_technical_indicators(&mut bars, "close", "tick_volume", &[5, 10]).unwrap();
        for name in ["ma5", "ma10", "rsi", "macd", "macd_signal", "macd_hist", "bb_upper", "volume_ma"] {
            assert_eq!(bars.column(name).map(|c| c.len()), Some(n), "{}", name);
        }
        assert_relative_eq!(bars.column("volume_ma").unwrap()[n - 1], 10.0);
        assert!(add_technical_indicators(&mut bars, "open", "tick_volume", &[5]).is_err());
    }
}
