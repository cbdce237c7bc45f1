//! Property-based tests for the invariants of metrics, splits, models and
//! session filtering.

use arima_analyzer::config::MarketHours;
use arima_analyzer::core::TimeSeries;
use arima_analyzer::data::{Bars, DataLoader};
use arima_analyzer::evaluation::{calculate_metrics, split_by_train_size};
use arima_analyzer::indicators::{bollinger_bands, rsi};
use arima_analyzer::models::arima::SARIMA;
use arima_analyzer::models::Forecaster;
use chrono::{Datelike, Duration, TimeZone, Timelike, Utc};
use proptest::prelude::*;

fn make_ts(values: &[f64]) -> TimeSeries {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let timestamps: Vec<_> = (0..values.len())
        .map(|i| base + Duration::hours(i as i64))
        .collect();
    TimeSeries::new(timestamps, values.to_vec()).unwrap()
}

/// Positive prices with non-zero variance.
fn price_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        prop::collection::vec(-1.0..1.0_f64, len).prop_map(|steps| {
            let mut level = 100.0;
            steps
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    level += s;
                    level + (i % 2) as f64 * 0.01
                })
                .collect()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn metrics_are_consistent(
        pairs in prop::collection::vec((-1e3..1e3_f64, -1e3..1e3_f64), 1..60)
    ) {
        let (actual, predicted): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let m = calculate_metrics(&actual, &predicted).unwrap();
        prop_assert!(m.mse >= 0.0 && m.mae >= 0.0 && m.mape >= 0.0);
        prop_assert!((m.rmse - m.mse.sqrt()).abs() <= 1e-9 * m.rmse.max(1.0));
        prop_assert!(m.mae <= m.rmse + 1e-9);

        let perfect = calculate_metrics(&actual, &actual).unwrap();
        prop_assert_eq!(perfect.mse, 0.0);
        prop_assert_eq!(perfect.mape, 0.0);
    }

    #[test]
    fn split_partitions_the_series(
        values in price_strategy(10, 200),
        train_size in 0.1..0.9_f64,
    ) {
        let ts = make_ts(&values);
        let (train, test) = split_by_train_size(&ts, train_size).unwrap();
        prop_assert_eq!(train.len(), (values.len() as f64 * train_size).floor() as usize);
        prop_assert_eq!(train.len() + test.len(), values.len());
        prop_assert!(train.last_timestamp().unwrap() < test.first_timestamp().unwrap());
    }

    #[test]
    fn unordered_timestamps_are_rejected(len in 3usize..50, swap in 0usize..48) {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut timestamps: Vec<_> = (0..len).map(|i| base + Duration::minutes(i as i64)).collect();
        let i = swap % (len - 1);
        timestamps.swap(i, i + 1);
        prop_assert!(TimeSeries::new(timestamps, vec![1.0; len]).is_err());
    }

    #[test]
    fn rsi_is_bounded(prices in price_strategy(20, 120)) {
        for value in rsi(&prices, 14).into_iter().filter(|v| v.is_finite()) {
            prop_assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn bollinger_bands_enclose_the_middle(prices in price_strategy(25, 120)) {
        let bb = bollinger_bands(&prices, 20, 2.0);
        for i in 19..prices.len() {
            prop_assert!(bb.lower[i] <= bb.middle[i] && bb.middle[i] <= bb.upper[i]);
        }
    }

    #[test]
    fn trading_filter_keeps_only_session_bars(
        offsets in prop::collection::btree_set(0i64..24 * 60 * 14, 1..200)
    ) {
        let base = Utc.with_ymd_and_hms(2024, 3, 25, 0, 0, 0).unwrap();
        let timestamps: Vec<_> = offsets.iter().map(|m| base + Duration::minutes(*m)).collect();
        let mut bars = Bars::new(timestamps);
        bars.insert_column("close", vec![1.0; offsets.len()]).unwrap();

        let market = MarketHours::default();
        let loader = DataLoader::new("unused").with_market(market.clone());
        let kept = loader.filter_trading_hours(&bars);

        prop_assert_eq!(
            kept.len(),
            bars.timestamps().iter().filter(|ts| market.is_open(*ts)).count()
        );
        for ts in kept.timestamps() {
            let local = ts.with_timezone(&market.timezone);
            prop_assert!(market.trading_days.contains(&local.weekday()));
            prop_assert!(local.hour() >= market.open_hour && local.hour() < market.close_hour);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn arima_forecasts_have_ordered_intervals(
        values in price_strategy(60, 120),
        horizon in 1usize..24,
    ) {
        let mut model = SARIMA::arima(1, 1, 1);
        model.fit(&make_ts(&values)).unwrap();
        let forecast = model.predict_with_intervals(horizon, 0.95).unwrap();
        prop_assert_eq!(forecast.horizon(), horizon);

        let lower = forecast.lower().unwrap();
        let upper = forecast.upper().unwrap();
        for i in 0..horizon {
            let point = forecast.values()[i];
            prop_assert!(point.is_finite());
            prop_assert!(lower[i] <= point && point <= upper[i]);
        }
    }
}
