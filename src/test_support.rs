//! Deterministic series generators shared by unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Uniform noise in `[-0.5, 0.5)` from a 64-bit LCG.
pub fn noise(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
        })
        .collect()
}

/// Approximately standard normal noise (sum of twelve uniforms).
pub fn gaussian_noise(n: usize, seed: u64) -> Vec<f64> {
    let u = noise(n * 12, seed);
    u.chunks(12).map(|c| c.iter().sum()).collect()
}

/// AR(1) process `x_t = phi x_{t-1} + e_t` started at zero.
pub fn ar1(n: usize, phi: f64, seed: u64) -> Vec<f64> {
    let e = gaussian_noise(n, seed);
    let mut x = vec![0.0; n];
    for t in 0..n {
        x[t] = e[t] + if t > 0 { phi * x[t - 1] } else { 0.0 };
    }
    x
}

/// Random walk with standard normal steps.
pub fn random_walk(n: usize, seed: u64) -> Vec<f64> {
    let e = gaussian_noise(n, seed);
    let mut level = 100.0;
    e.iter()
        .map(|step| {
            level += step;
            level
        })
        .collect()
}

/// Hourly timestamps from 2024-01-01 00:00 UTC.
pub fn make_timestamps(n: usize) -> Vec<DateTime<Utc>> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n).map(|i| base + Duration::hours(i as i64)).collect()
}
