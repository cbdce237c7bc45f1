//! TimeSeries data structure for a single price column.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::error::{AnalyzerError, Result};

/// Policy for handling missing values (NaN/Inf).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingValuePolicy {
    /// Drop observations with missing values.
    Drop,
    /// Fill with a specific value.
    Fill(f64),
    /// Forward fill (use previous valid value).
    ForwardFill,
    /// Linear interpolation between valid neighbours, edges filled.
    Interpolate,
    /// Return error if missing values found.
    Error,
}

/// A univariate time series: strictly increasing timestamps with one value each.
///
/// Timestamps are stored in UTC; `timezone` is the exchange timezone used to
/// reason about sessions and trading days.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    name: String,
    timezone: Tz,
    metadata: BTreeMap<String, String>,
}

impl TimeSeries {
    /// Create a series, validating ordering and lengths.
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(AnalyzerError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len(),
            });
        }

        if let Some(w) = timestamps.windows(2).find(|w| w[1] <= w[0]) {
            return Err(AnalyzerError::TimestampError(format!(
                "timestamps must be strictly increasing ({} followed by {})",
                w[0], w[1]
            )));
        }

        Ok(Self {
            timestamps,
            values,
            name: String::from("value"),
            timezone: Tz::UTC,
            metadata: BTreeMap::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Timestamps converted to the series timezone.
    pub fn local_timestamps(&self) -> Vec<DateTime<Tz>> {
        self.timestamps
            .iter()
            .map(|t| t.with_timezone(&self.timezone))
            .collect()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Copy of the observations in `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> Result<TimeSeries> {
        if start > end {
            return Err(AnalyzerError::InvalidParameter(
                "start must be <= end".to_string(),
            ));
        }
        if end > self.len() {
            return Err(AnalyzerError::InvalidParameter(format!(
                "slice end {} exceeds series length {}",
                end,
                self.len()
            )));
        }

        Ok(self.derive(
            self.timestamps[start..end].to_vec(),
            self.values[start..end].to_vec(),
        ))
    }

    /// Check if series has missing values (NaN or Inf).
    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_finite()).count()
    }

    /// Return a sanitized copy with missing values handled.
    pub fn sanitized(&self, policy: MissingValuePolicy) -> Result<TimeSeries> {
        match policy {
            MissingValuePolicy::Error => {
                if self.has_missing_values() {
                    return Err(AnalyzerError::MissingValues);
                }
                Ok(self.clone())
            }
            MissingValuePolicy::Drop => {
                let (timestamps, values): (Vec<_>, Vec<_>) = self
                    .timestamps
                    .iter()
                    .zip(&self.values)
                    .filter(|(_, v)| v.is_finite())
                    .map(|(t, v)| (*t, *v))
                    .unzip();
                Ok(self.derive(timestamps, values))
            }
            MissingValuePolicy::Fill(fill_value) => {
                let values = self
                    .values
                    .iter()
                    .map(|&v| if v.is_finite() { v } else { fill_value })
                    .collect();
                Ok(self.derive(self.timestamps.clone(), values))
            }
            MissingValuePolicy::ForwardFill => {
                let mut last_valid = None;
                let values = self
                    .values
                    .iter()
                    .map(|&v| {
                        if v.is_finite() {
                            last_valid = Some(v);
                            v
                        } else {
                            last_valid.unwrap_or(v)
                        }
                    })
                    .collect();
                Ok(self.derive(self.timestamps.clone(), values))
            }
            MissingValuePolicy::Interpolate => Ok(self.interpolated(true)),
        }
    }

    /// Return a copy with linear interpolation for NaN values.
    pub fn interpolated(&self, fill_edges: bool) -> TimeSeries {
        self.derive(
            self.timestamps.clone(),
            interpolate_series(&self.values, fill_edges),
        )
    }

    /// Infer the modal spacing between consecutive timestamps.
    ///
    /// Fails when the modal spacing accounts for less than `tolerance` of all gaps.
    pub fn infer_frequency(&self, tolerance: f64) -> Result<Duration> {
        if self.len() < 2 {
            return Err(AnalyzerError::InsufficientData {
                needed: 2,
                got: self.len(),
            });
        }

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for w in self.timestamps.windows(2) {
            *counts.entry((w[1] - w[0]).num_seconds()).or_insert(0) += 1;
        }

        // Ties resolve to the smaller spacing so the result is deterministic.
        let (modal_diff, modal_count) = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(&diff, &count)| (diff, count))
            .ok_or_else(|| AnalyzerError::TimestampError("empty spacing data".to_string()))?;

        let modal_ratio = modal_count as f64 / (self.len() - 1) as f64;
        if modal_ratio < tolerance {
            return Err(AnalyzerError::TimestampError(
                "no unique modal spacing found".to_string(),
            ));
        }

        Ok(Duration::seconds(modal_diff))
    }

    fn derive(&self, timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> TimeSeries {
        TimeSeries {
            timestamps,
            values,
            name: self.name.clone(),
            timezone: self.timezone,
            metadata: self.metadata.clone(),
        }
    }
}

/// Linear interpolation for a series with NaN values.
pub(crate) fn interpolate_series(values: &[f64], fill_edges: bool) -> Vec<f64> {
    let mut result = values.to_vec();
    let n = result.len();

    let mut i = 0;
    while i < n {
        if result[i].is_finite() {
            i += 1;
            continue;
        }

        let start = i;
        while i < n && !result[i].is_finite() {
            i += 1;
        }
        let end = i;

        let left = if start > 0 { Some(result[start - 1]) } else { None };
        let right = if end < n { Some(result[end]) } else { None };

        match (left, right) {
            (Some(l), Some(r)) => {
                let segments = (end - start + 1) as f64;
                for (j, idx) in (start..end).enumerate() {
                    let t = (j + 1) as f64 / segments;
                    result[idx] = l + t * (r - l);
                }
            }
            (Some(l), None) if fill_edges => result[start..end].fill(l),
            (None, Some(r)) if fill_edges => result[start..end].fill(r),
            _ => {}
        }
    }

    result
}
