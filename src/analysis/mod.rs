//! Exploratory analysis: stationarity, decomposition and correlograms.

pub mod autocorrelation;
pub mod seasonal;
pub mod stationarity;
pub mod summary;

pub use autocorrelation::{acf, pacf, Correlogram};
pub use seasonal::{
    decompose, estimate_seasonal_period, Decomposition, DecompositionModel, SeasonalAnalysis,
    SeasonalAnalyzer,
};
pub use stationarity::{
    adf_test, combined_stationarity, kpss_test, test_stationarity, CriticalValues,
    StationarityReport, StationarityResult, StationarityVerdict,
};
pub use summary::{normality_test, SeriesSummary};
