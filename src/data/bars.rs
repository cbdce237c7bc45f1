//! Column-oriented table of price bars.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;

use crate::core::TimeSeries;
use crate::error::{AnalyzerError, Result};

/// Timestamps plus named numeric columns in file order.
#[derive(Debug, Clone, Default)]
pub struct Bars {
    timestamps: Vec<DateTime<Utc>>,
    columns: IndexMap<String, Vec<f64>>,
}

impl Bars {
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps,
            columns: IndexMap::new(),
        }
    }

    /// Build from unordered rows; rows sharing a timestamp keep the last one.
    ///
    /// Returns the table and the number of dropped duplicates.
    pub(crate) fn from_rows(
        names: Vec<String>,
        mut rows: Vec<(DateTime<Utc>, Vec<f64>)>,
    ) -> (Self, usize) {
        rows.sort_by_key(|(ts, _)| *ts);

        let mut deduped: Vec<(DateTime<Utc>, Vec<f64>)> = Vec::with_capacity(rows.len());
        let mut duplicates = 0;
        for row in rows {
            if deduped.last().is_some_and(|(prev, _)| *prev == row.0) {
                deduped.pop();
                duplicates += 1;
            }
            deduped.push(row);
        }

        let mut columns: IndexMap<String, Vec<f64>> = names
            .into_iter()
            .map(|name| (name, Vec::with_capacity(deduped.len())))
            .collect();
        let mut timestamps = Vec::with_capacity(deduped.len());
        for (ts, values) in deduped {
            timestamps.push(ts);
            for (column, value) in columns.values_mut().zip(values) {
                column.push(value);
            }
        }
        (
            Self {
                timestamps,
                columns,
            },
            duplicates,
        )
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Like [`column`](Self::column), failing with the available names.
    pub fn require_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name).ok_or_else(|| AnalyzerError::ColumnNotFound {
            column: name.to_string(),
            available: self.column_names(),
        })
    }

    /// Add or replace a column.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(AnalyzerError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        self.columns.insert(name.into(), values);
        Ok(())
    }

    /// Rows whose timestamp satisfies `keep`.
    pub fn filter<F>(&self, mut keep: F) -> Bars
    where
        F: FnMut(&DateTime<Utc>) -> bool,
    {
        let mask: Vec<bool> = self.timestamps.iter().map(|ts| keep(ts)).collect();
        let pick = |values: &[f64]| -> Vec<f64> {
            values
                .iter()
                .zip(&mask)
                .filter(|(_, m)| **m)
                .map(|(v, _)| *v)
                .collect()
        };
        Bars {
            timestamps: self
                .timestamps
                .iter()
                .zip(&mask)
                .filter(|(_, m)| **m)
                .map(|(t, _)| *t)
                .collect(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), pick(values)))
                .collect(),
        }
    }

    /// One column as a series in the given market timezone.
    pub fn to_series(&self, column: &str, timezone: Tz) -> Result<TimeSeries> {
        let values = self.require_column(column)?.to_vec();
        Ok(TimeSeries::new(self.timestamps.clone(), values)?
            .with_name(column)
            .with_timezone(timezone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn rows_are_sorted_and_deduplicated() {
        let rows = vec![
            (ts(3), vec![3.0, 30.0]),
            (ts(1), vec![1.0, 10.0]),
            (ts(3), vec![4.0, 40.0]),
            (ts(2), vec![2.0, 20.0]),
        ];
        let (bars, duplicates) = Bars::from_rows(vec!["close".into(), "tick_volume".into()], rows);
        assert_eq!(duplicates, 1);
        assert_eq!(bars.timestamps(), &[ts(1), ts(2), ts(3)]);
        assert_eq!(bars.column("close").unwrap(), &[1.0, 2.0, 4.0]);
        assert_eq!(bars.column_names(), vec!["close", "tick_volume"]);
    }

    #[test]
    fn filter_keeps_matching_rows() {
        let mut bars = Bars::new(vec![ts(1), ts(2), ts(3)]);
        bars.insert_column("close", vec![1.0, 2.0, 3.0]).unwrap();
        let kept = bars.filter(|t| *t != ts(2));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.column("close").unwrap(), &[1.0, 3.0]);
    }

    #[test]
    fn missing_column_lists_alternatives() {
        let mut bars = Bars::new(vec![ts(1)]);
        bars.insert_column("open", vec![1.0]).unwrap();
        match bars.require_column("close") {
            Err(AnalyzerError::ColumnNotFound { column, available }) => {
                assert_eq!(column, "close");
                assert_eq!(available, vec!["open"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(bars.insert_column("high", vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn column_becomes_named_series() {
        let mut bars = Bars::new(vec![ts(1), ts(2)]);
        bars.insert_column("close", vec![5.0, 6.0]).unwrap();
        let series = bars.to_series("close", chrono_tz::Europe::Warsaw).unwrap();
        assert_eq!(series.name(), "close");
        assert_eq!(series.timezone(), chrono_tz::Europe::Warsaw);
        assert_eq!(series.values(), &[5.0, 6.0]);
    }
}
