//! Chronological train/test partitioning

use super::features::FeatureTable;
use crate::error::{FlowcastError, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Time boundary between the training and test partitions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitBoundary {
    /// Rows strictly before this instant are training rows
    pub timestamp: NaiveDateTime,
    /// Quantile of the timestamps the boundary was taken at
    pub quantile: f64,
}

/// Result of a temporal split
#[derive(Debug, Clone)]
pub struct TemporalSplit {
    pub train: FeatureTable,
    pub test: FeatureTable,
    pub boundary: SplitBoundary,
}

/// Splits a feature table by a timestamp quantile, never by sampling
#[derive(Debug, Clone, Copy)]
pub struct TemporalSplitter {
    test_fraction: f64,
}

impl Default for TemporalSplitter {
    fn default() -> Self {
        Self::new(0.3)
    }
}

impl TemporalSplitter {
    pub fn new(test_fraction: f64) -> Self {
        Self { test_fraction }
    }

    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Fails with `InsufficientSplitData` unless the fraction lies strictly inside (0, 1)
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(FlowcastError::InsufficientSplitData(format!(
                "test fraction must lie strictly between 0 and 1, got {}",
                self.test_fraction
            )));
        }
        Ok(())
    }

    /// Linearly interpolated `(1 - test_fraction)` quantile of ascending timestamps
    pub fn boundary(&self, timestamps: &[NaiveDateTime]) -> Result<SplitBoundary> {
        self.validate()?;
        if timestamps.is_empty() {
            return Err(FlowcastError::InsufficientSplitData(
                "cannot split an empty table".to_string(),
            ));
        }

        let quantile = 1.0 - self.test_fraction;
        let pos = quantile * (timestamps.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(timestamps.len() - 1);
        let frac = pos - lo as f64;

        // Rounding the offset up keeps `t < boundary` identical to comparing
        // against the exact real-valued quantile for millisecond timestamps.
        let span_ms = (timestamps[hi] - timestamps[lo]).num_milliseconds();
        let offset_ms = (frac * span_ms as f64).ceil() as i64;
        let timestamp = timestamps[lo] + Duration::milliseconds(offset_ms);

        Ok(SplitBoundary { timestamp, quantile })
    }

    /// Partition `table` into rows before the boundary and rows at or after it
    pub fn split(&self, table: &FeatureTable) -> Result<TemporalSplit> {
        let boundary = self.boundary(table.timestamps())?;

        if table.timestamps().windows(2).any(|w| w[0] >= w[1]) {
            return Err(FlowcastError::FeatureComputation(
                "feature table timestamps are not strictly increasing".to_string(),
            ));
        }

        let cut = table.timestamps().partition_point(|t| *t < boundary.timestamp);
        if cut == 0 {
            return Err(FlowcastError::InsufficientSplitData(format!(
                "no rows before boundary {}",
                boundary.timestamp
            )));
        }
        if cut == table.len() {
            return Err(FlowcastError::InsufficientSplitData(format!(
                "no rows at or after boundary {}",
                boundary.timestamp
            )));
        }

        let train = table.slice_rows(0, cut);
        let test = table.slice_rows(cut, table.len());

        info!(
            boundary = %boundary.timestamp,
            train_rows = train.len(),
            test_rows = test.len(),
            "Temporal split"
        );

        Ok(TemporalSplit { train, test, boundary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;
    use ndarray::{Array1, Array2};

    fn table(n: usize) -> FeatureTable {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let timestamps = (0..n).map(|i| start + Duration::days(i as i64)).collect();
        let target = Array1::from_iter((0..n).map(|i| i as f64));
        let features = Array2::from_shape_fn((n, 1), |(r, _)| r as f64);
        FeatureTable::from_parts("s", "flow", timestamps, target, features, vec!["x".into()]).unwrap()
    }

    #[test]
    fn test_boundary_matches_linear_quantile() {
        let t = table(11);
        // 0.7 * 10 = 7 exactly
        let b = TemporalSplitter::new(0.3).boundary(t.timestamps()).unwrap();
        assert_eq!(b.timestamp, t.timestamps()[7]);

        // 0.75 * 3 = 2.25 -> quarter of the way into day 2
        let t = table(4);
        let b = TemporalSplitter::new(0.25).boundary(t.timestamps()).unwrap();
        assert_eq!(b.timestamp, t.timestamps()[2] + Duration::hours(6));
    }

    #[test]
    fn test_split_is_chronological_and_exhaustive() {
        let t = table(100);
        for fraction in [0.05, 0.1, 0.3, 0.5, 0.9] {
            let split = TemporalSplitter::new(fraction).split(&t).unwrap();
            assert_eq!(split.train.len() + split.test.len(), t.len());
            let last_train = *split.train.timestamps().last().unwrap();
            let first_test = split.test.timestamps()[0];
            assert!(last_train < first_test);
            assert!(last_train < split.boundary.timestamp);
            assert!(first_test >= split.boundary.timestamp);
        }
    }

    #[test]
    fn test_degenerate_fractions_rejected() {
        let t = table(10);
        for fraction in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let err = TemporalSplitter::new(fraction).split(&t).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InsufficientSplitData);
        }
    }

    #[test]
    fn test_single_row_cannot_split() {
        let t = table(1);
        let err = TemporalSplitter::new(0.3).split(&t).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientSplitData);
    }
}
