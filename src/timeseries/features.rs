//! Feature engineering for daily discharge series

use crate::error::{FlowcastError, Result};
use crate::series::{find_cadence_break, FlowSeries, DEFAULT_TARGET};
use chrono::{Datelike, NaiveDateTime};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info};

/// Configuration for the derived feature set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Lag offsets in days
    pub lags: Vec<usize>,
    /// Trailing window sizes in days (mean and std per window)
    pub windows: Vec<usize>,
    /// Include year, month, day, day-of-year and quarter
    pub include_calendar: bool,
    /// Include sin/cos encodings of month and day-of-year
    pub include_cyclic: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 2, 3, 7, 15, 30],
            windows: vec![3, 7, 15, 30],
            include_calendar: true,
            include_cyclic: true,
        }
    }
}

impl FeatureConfig {
    pub fn with_lags(mut self, lags: Vec<usize>) -> Self {
        self.lags = lags;
        self
    }

    pub fn with_windows(mut self, windows: Vec<usize>) -> Self {
        self.windows = windows;
        self
    }

    pub fn with_calendar(mut self, include: bool) -> Self {
        self.include_calendar = include;
        self
    }

    pub fn with_cyclic(mut self, include: bool) -> Self {
        self.include_cyclic = include;
        self
    }

    pub fn max_lag(&self) -> usize {
        self.lags.iter().copied().max().unwrap_or(0)
    }

    pub fn max_window(&self) -> usize {
        self.windows.iter().copied().max().unwrap_or(0)
    }

    /// Leading rows that can never have every feature defined
    pub fn warmup_rows(&self) -> usize {
        self.max_lag().max(self.max_window().saturating_sub(1))
    }

    /// Conservative history margin the loader asks for on top of the usable rows
    pub fn lookback_rows(&self) -> usize {
        self.max_lag() + self.max_window()
    }

    /// Number of feature columns this configuration produces
    pub fn n_features(&self) -> usize {
        let calendar = if self.include_calendar { 5 } else { 0 };
        let cyclic = if self.include_cyclic { 4 } else { 0 };
        calendar + cyclic + self.lags.len() + 2 * self.windows.len()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(&lag) = self.lags.iter().find(|&&l| l == 0) {
            return Err(FlowcastError::InvalidParameter {
                name: "lags".to_string(),
                value: lag.to_string(),
                reason: "lag offsets must be at least 1 (lag 0 is the target itself)".to_string(),
            });
        }
        if let Some(&window) = self.windows.iter().find(|&&w| w < 2) {
            return Err(FlowcastError::InvalidParameter {
                name: "windows".to_string(),
                value: window.to_string(),
                reason: "rolling windows need at least 2 rows for a standard deviation".to_string(),
            });
        }
        for (name, offsets) in [("lags", &self.lags), ("windows", &self.windows)] {
            if let Some(dup) = first_duplicate(offsets) {
                return Err(FlowcastError::InvalidParameter {
                    name: name.to_string(),
                    value: dup.to_string(),
                    reason: "listed more than once; every feature column must be unique".to_string(),
                });
            }
        }
        if self.n_features() == 0 {
            return Err(FlowcastError::ConfigError("feature set is empty".to_string()));
        }
        Ok(())
    }
}

fn first_duplicate(offsets: &[usize]) -> Option<usize> {
    let mut seen = std::collections::BTreeSet::new();
    offsets.iter().copied().find(|o| !seen.insert(*o))
}

/// Supervised-learning table: one row per usable day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    site_id: String,
    target_label: String,
    timestamps: Vec<NaiveDateTime>,
    target: Array1<f64>,
    features: Array2<f64>,
    feature_names: Vec<String>,
}

/// Borrowed view of a single table row
#[derive(Debug, Clone)]
pub struct FeatureRow<'a> {
    pub timestamp: NaiveDateTime,
    pub flow: f64,
    names: &'a [String],
    values: ArrayView1<'a, f64>,
}

impl<'a> FeatureRow<'a> {
    /// Value of a named feature
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names.iter().position(|n| n == name).map(|i| self.values[i])
    }

    /// Features in column order
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, f64)> + '_ {
        self.names.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}

impl FeatureTable {
    /// Assemble a table from parts, checking that the shapes agree
    pub fn from_parts(
        site_id: impl Into<String>,
        target_label: impl Into<String>,
        timestamps: Vec<NaiveDateTime>,
        target: Array1<f64>,
        features: Array2<f64>,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        let n = timestamps.len();
        if target.len() != n || features.nrows() != n {
            return Err(FlowcastError::ShapeError {
                expected: format!("{} rows", n),
                actual: format!("target {} rows, features {} rows", target.len(), features.nrows()),
            });
        }
        if features.ncols() != feature_names.len() {
            return Err(FlowcastError::ShapeError {
                expected: format!("{} feature columns", feature_names.len()),
                actual: format!("{} columns", features.ncols()),
            });
        }
        Ok(Self {
            site_id: site_id.into(),
            target_label: target_label.into(),
            timestamps,
            target,
            features,
            feature_names,
        })
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    /// Feature matrix, rows aligned with `timestamps`
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// First usable date after the warm-up rows were dropped
    pub fn usable_start(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn usable_end(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    pub fn row(&self, index: usize) -> Option<FeatureRow<'_>> {
        if index >= self.len() {
            return None;
        }
        Some(FeatureRow {
            timestamp: self.timestamps[index],
            flow: self.target[index],
            names: &self.feature_names,
            values: self.features.row(index),
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = FeatureRow<'_>> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// Column of a named feature
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.features.column(i))
    }

    /// Count of non-finite cells across target and features
    pub fn count_missing(&self) -> usize {
        self.target.iter().filter(|v| !v.is_finite()).count()
            + self.features.iter().filter(|v| !v.is_finite()).count()
    }

    /// New table holding rows `start..end`
    pub fn slice_rows(&self, start: usize, end: usize) -> FeatureTable {
        let end = end.min(self.len());
        let start = start.min(end);
        let indices: Vec<usize> = (start..end).collect();
        self.select_rows(&indices)
    }

    /// New table holding the given rows in the given order
    pub fn select_rows(&self, indices: &[usize]) -> FeatureTable {
        FeatureTable {
            site_id: self.site_id.clone(),
            target_label: self.target_label.clone(),
            timestamps: indices.iter().map(|&i| self.timestamps[i]).collect(),
            target: self.target.select(Axis(0), indices),
            features: self.features.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
        }
    }
}

/// Stateless transform from a daily series to a [`FeatureTable`]
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: FeatureConfig,
    target_label: String,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            target_label: DEFAULT_TARGET.to_string(),
        }
    }

    /// Target column the input series must carry
    pub fn with_target_label(mut self, label: impl Into<String>) -> Self {
        self.target_label = label.into();
        self
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Feature names in column order
    pub fn feature_names(&self) -> Vec<String> {
        let target = &self.target_label;
        let mut names = Vec::with_capacity(self.config.n_features());
        if self.config.include_calendar {
            names.extend(["year", "month", "day", "dayofyear", "quarter"].map(String::from));
        }
        if self.config.include_cyclic {
            names.extend(["month_sin", "month_cos", "day_sin", "day_cos"].map(String::from));
        }
        for lag in &self.config.lags {
            names.push(format!("{}_lag_{}", target, lag));
        }
        for window in &self.config.windows {
            names.push(format!("{}_rolling_mean_{}", target, window));
            names.push(format!("{}_rolling_std_{}", target, window));
        }
        names
    }

    /// Derive all features and drop every row with an undefined value
    pub fn build(&self, series: &FlowSeries) -> Result<FeatureTable> {
        self.config.validate()?;

        if series.target_label() != self.target_label {
            return Err(FlowcastError::FeatureComputation(format!(
                "input series has no `{}` column (found `{}`)",
                self.target_label,
                series.target_label()
            )));
        }
        let timestamps = series.timestamps();
        let values = series.values();
        if timestamps.len() != values.len() {
            return Err(FlowcastError::FeatureComputation(format!(
                "{} timestamps but {} `{}` values",
                timestamps.len(),
                values.len(),
                self.target_label
            )));
        }
        if series.is_empty() {
            return Err(FlowcastError::DataUnavailable(format!(
                "series for site {} is empty",
                series.site_id()
            )));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(FlowcastError::FeatureComputation(format!(
                "`{}` is undefined at {}",
                self.target_label, timestamps[pos]
            )));
        }
        if let Some(gap) = find_cadence_break(timestamps) {
            return Err(FlowcastError::IrregularCadence(format!(
                "site {}: lag and rolling features need a gap-free daily series, found {}",
                series.site_id(),
                gap
            )));
        }

        let n = values.len();
        let names = self.feature_names();
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(names.len());

        if self.config.include_calendar {
            columns.push(timestamps.iter().map(|t| t.year() as f64).collect());
            columns.push(timestamps.iter().map(|t| t.month() as f64).collect());
            columns.push(timestamps.iter().map(|t| t.day() as f64).collect());
            columns.push(timestamps.iter().map(|t| t.ordinal() as f64).collect());
            columns.push(timestamps.iter().map(|t| quarter(t.month()) as f64).collect());
        }

        if self.config.include_cyclic {
            let (month_sin, month_cos): (Vec<f64>, Vec<f64>) =
                timestamps.iter().map(|t| cyclic(t.month() as f64, 12.0)).unzip();
            let (day_sin, day_cos): (Vec<f64>, Vec<f64>) =
                timestamps.iter().map(|t| cyclic(t.ordinal() as f64, 365.0)).unzip();
            columns.push(month_sin);
            columns.push(month_cos);
            columns.push(day_sin);
            columns.push(day_cos);
        }

        for &lag in &self.config.lags {
            columns.push(lagged(values, lag));
        }

        for &window in &self.config.windows {
            let (mean, std) = rolling_mean_std(values, window);
            columns.push(mean);
            columns.push(std);
        }

        let complete: Vec<usize> = (0..n)
            .filter(|&i| columns.iter().all(|col| col[i].is_finite()))
            .collect();

        if complete.is_empty() {
            return Err(FlowcastError::InsufficientData {
                required: self.config.warmup_rows() + 1,
                actual: n,
            });
        }

        let n_rows = complete.len();
        let n_cols = columns.len();
        let features = Array2::from_shape_fn((n_rows, n_cols), |(r, c)| columns[c][complete[r]]);
        let target: Array1<f64> = complete.iter().map(|&i| values[i]).collect();
        let kept_timestamps: Vec<NaiveDateTime> = complete.iter().map(|&i| timestamps[i]).collect();

        debug!(dropped = n - n_rows, "Dropped rows with undefined lag/rolling values");
        info!(
            site = series.site_id(),
            rows = n_rows,
            features = n_cols,
            usable_start = %kept_timestamps[0],
            "Built feature table"
        );

        FeatureTable::from_parts(
            series.site_id(),
            self.target_label.clone(),
            kept_timestamps,
            target,
            features,
            names,
        )
    }
}

fn quarter(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

/// `(sin, cos)` of `value` on a circle of `period`
pub fn cyclic(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

/// Value `lag` rows earlier, NaN where no such row exists
fn lagged(values: &[f64], lag: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i >= lag { values[i - lag] } else { f64::NAN })
        .collect()
}

/// Trailing mean and sample standard deviation over `window` rows ending at
/// the current row. NaN until a full window is available.
fn rolling_mean_std(values: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let n = values.len();
    let mut mean = vec![f64::NAN; n];
    let mut std = vec![f64::NAN; n];
    if window == 0 {
        return (mean, std);
    }

    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        let m = slice.iter().sum::<f64>() / window as f64;
        mean[i] = m;
        std[i] = if window > 1 {
            let ss: f64 = slice.iter().map(|v| (v - m).powi(2)).sum();
            (ss / (window - 1) as f64).sqrt()
        } else {
            f64::NAN
        };
    }
    (mean, std)
}
