//! Forecast evaluation: splits, error metrics and cross-validation.

pub mod cross_validation;
pub mod metrics;
pub mod split;

pub use cross_validation::{cross_validate, AggregatedMetrics, CVConfig, CVResults, CVStrategy};
pub use metrics::{calculate_metrics, ForecastMetrics};
pub use split::{split_by_train_size, train_test_split};
