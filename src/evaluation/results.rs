//! Row-level prediction results and their error statistics

use super::evaluator::EvaluationResult;
use crate::error::{FlowcastError, Result};
use crate::timeseries::FeatureTable;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One test row joined with its prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub timestamp: NaiveDateTime,
    pub actual: f64,
    pub predicted: f64,
    /// `actual - predicted`
    pub error: f64,
    pub abs_error: f64,
    /// `error / actual * 100`; `None` when the actual flow is (near) zero
    pub percent_error: Option<f64>,
}

impl ResultRow {
    pub fn percent_defined(&self) -> bool {
        self.percent_error.is_some()
    }
}

/// Equal-width histogram over a closed value range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `counts.len() + 1` ascending bin edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins spanning their min and max
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        if values.is_empty() {
            return Self {
                edges: Vec::new(),
                counts: Vec::new(),
            };
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = if max > min { (min, max) } else { (min - 0.5, min + 0.5) };
        let width = (hi - lo) / bins as f64;

        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0usize; bins];
        for &v in values {
            // The top edge belongs to the last bin
            let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Self { edges, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Aggregate error statistics of a [`ResultTable`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub rows: usize,
    pub mean_error: f64,
    pub mean_abs_error: f64,
    pub max_abs_error: f64,
    /// Population standard deviation of the signed error
    pub error_std: f64,
    /// Mean absolute percent error over rows where it is defined
    pub mape: Option<f64>,
    pub undefined_percent_rows: usize,
    pub error_histogram: Histogram,
    pub percent_error_histogram: Histogram,
}

/// Test-partition results in row order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultTable {
    pub site_id: String,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn undefined_percent_rows(&self) -> usize {
        self.rows.iter().filter(|r| !r.percent_defined()).count()
    }

    pub fn summary(&self, bins: usize) -> ErrorSummary {
        let errors: Vec<f64> = self.rows.iter().map(|r| r.error).collect();
        let percents: Vec<f64> = self.rows.iter().filter_map(|r| r.percent_error).collect();

        let n = errors.len();
        let (mean_error, mean_abs_error, max_abs_error, error_std) = if n == 0 {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let nf = n as f64;
            let mean = errors.iter().sum::<f64>() / nf;
            let mean_abs = errors.iter().map(|e| e.abs()).sum::<f64>() / nf;
            let max_abs = errors.iter().map(|e| e.abs()).fold(0.0, f64::max);
            let var = errors.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / nf;
            (mean, mean_abs, max_abs, var.sqrt())
        };

        let mape = if percents.is_empty() {
            None
        } else {
            Some(percents.iter().map(|p| p.abs()).sum::<f64>() / percents.len() as f64)
        };

        ErrorSummary {
            rows: n,
            mean_error,
            mean_abs_error,
            max_abs_error,
            error_std,
            mape,
            undefined_percent_rows: n - percents.len(),
            error_histogram: Histogram::from_values(&errors, bins),
            percent_error_histogram: Histogram::from_values(&percents, bins),
        }
    }
}

/// Joins test timestamps and actuals with predictions
#[derive(Debug, Clone, Copy)]
pub struct ResultAssembler {
    zero_flow_tolerance: f64,
}

impl Default for ResultAssembler {
    fn default() -> Self {
        Self::new(1e-6)
    }
}

impl ResultAssembler {
    /// `zero_flow_tolerance`: actual flows with magnitude at or below this have no percent error
    pub fn new(zero_flow_tolerance: f64) -> Self {
        Self {
            zero_flow_tolerance: zero_flow_tolerance.abs(),
        }
    }

    pub fn zero_flow_tolerance(&self) -> f64 {
        self.zero_flow_tolerance
    }

    pub fn row(&self, timestamp: NaiveDateTime, actual: f64, predicted: f64) -> ResultRow {
        let error = actual - predicted;
        let percent_error = if actual.abs() > self.zero_flow_tolerance {
            Some(error / actual * 100.0)
        } else {
            None
        };
        ResultRow {
            timestamp,
            actual,
            predicted,
            error,
            abs_error: error.abs(),
            percent_error,
        }
    }

    pub fn assemble(
        &self,
        site_id: &str,
        timestamps: &[NaiveDateTime],
        actual: &[f64],
        predicted: &[f64],
    ) -> Result<ResultTable> {
        if timestamps.len() != actual.len() || actual.len() != predicted.len() {
            return Err(FlowcastError::ShapeError {
                expected: format!("{} timestamps, actuals and predictions", timestamps.len()),
                actual: format!("{} actuals, {} predictions", actual.len(), predicted.len()),
            });
        }

        let rows = timestamps
            .iter()
            .zip(actual.iter().zip(predicted.iter()))
            .map(|(&ts, (&a, &p))| self.row(ts, a, p))
            .collect();

        Ok(ResultTable {
            site_id: site_id.to_string(),
            rows,
        })
    }

    pub fn assemble_evaluation(&self, test: &FeatureTable, evaluation: &EvaluationResult) -> Result<ResultTable> {
        let actual = test.target().to_vec();
        let predicted = evaluation.predictions.to_vec();
        self.assemble(test.site_id(), test.timestamps(), &actual, &predicted)
    }
}
