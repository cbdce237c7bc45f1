//! Differencing, integration and differencing-order selection.

use crate::analysis::seasonal::seasonal_strength_of;
use crate::analysis::stationarity::kpss_test;
use crate::models::arima::poly::differencing_operator;

/// Apply `d` rounds of first differencing.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            return vec![];
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Apply `d` rounds of lag-`period` differencing.
pub fn seasonal_difference(series: &[f64], d: usize, period: usize) -> Vec<f64> {
    if period == 0 {
        return series.to_vec();
    }
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= period {
            return vec![];
        }
        result = (period..result.len())
            .map(|i| result[i] - result[i - period])
            .collect();
    }
    result
}

/// Apply `(1 - B)^d (1 - B^s)^D` to a series.
pub fn full_difference(series: &[f64], d: usize, cap_d: usize, s: usize) -> Vec<f64> {
    difference(&seasonal_difference(series, cap_d, s), d)
}

/// Undo differencing of future values.
///
/// `differenced` holds values of the differenced process following the end of
/// `history`; the result is on the scale of `history`.
pub fn integrate(differenced: &[f64], history: &[f64], d: usize, cap_d: usize, s: usize) -> Vec<f64> {
    let op = differencing_operator(d, cap_d, s);
    let mut extended = history.to_vec();
    for &w in differenced {
        let t = extended.len();
        let mut y = w;
        for (lag, c) in op.iter().enumerate().skip(1) {
            if *c != 0.0 && t >= lag {
                y -= c * extended[t - lag];
            }
        }
        extended.push(y);
    }
    extended.split_off(history.len())
}

/// Number of first differences needed for KPSS level stationarity at 5%.
pub fn suggest_differencing(series: &[f64], max_d: usize) -> usize {
    let mut current = series.to_vec();
    let mut d = 0;
    while d < max_d {
        if current.len() < 10 || is_constant(&current) {
            break;
        }
        let result = kpss_test(&current, None);
        if result.statistic.is_nan() || result.is_stationary {
            break;
        }
        current = difference(&current, 1);
        d += 1;
    }
    d
}

/// Number of seasonal differences suggested by seasonal strength.
///
/// A strength of at least 0.64 calls for one seasonal difference, matching the
/// usual `nsdiffs` heuristic.
pub fn suggest_seasonal_differencing(series: &[f64], period: usize, max_cap_d: usize) -> usize {
    if max_cap_d == 0 || period < 2 || series.len() < 2 * period {
        return 0;
    }
    match seasonal_strength_of(series, period) {
        Some(strength) if strength >= 0.64 => 1,
        _ => 0,
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| (w[1] - w[0]).abs() < 1e-12)
}
