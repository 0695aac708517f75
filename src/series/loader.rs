//! Series loader: ordering, deduplication, cadence and length checks

use super::{FlowSeries, RawObservation, SeriesSource, DEFAULT_TARGET};
use crate::error::{FlowcastError, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How to treat missing days in the series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Fail with `IrregularCadence` on the first missing day
    Reject,
    /// Linearly interpolate missing days onto a daily grid
    Interpolate,
}

impl Default for GapPolicy {
    fn default() -> Self {
        GapPolicy::Reject
    }
}

impl std::str::FromStr for GapPolicy {
    type Err = FlowcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(GapPolicy::Reject),
            "interpolate" => Ok(GapPolicy::Interpolate),
            other => Err(FlowcastError::InvalidParameter {
                name: "gap_policy".to_string(),
                value: other.to_string(),
                reason: "expected `reject` or `interpolate`".to_string(),
            }),
        }
    }
}

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Rows that must remain usable after the feature warm-up is dropped
    pub min_usable_rows: usize,
    /// Missing-day handling
    pub gap_policy: GapPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            min_usable_rows: 100,
            gap_policy: GapPolicy::Reject,
        }
    }
}

impl LoaderConfig {
    pub fn with_min_usable_rows(mut self, rows: usize) -> Self {
        self.min_usable_rows = rows;
        self
    }

    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }
}

/// A place where consecutive timestamps are not exactly one day apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceBreak {
    /// Index of the row after the break
    pub index: usize,
    pub previous: NaiveDateTime,
    pub next: NaiveDateTime,
}

impl CadenceBreak {
    pub fn step(&self) -> Duration {
        self.next - self.previous
    }
}

impl std::fmt::Display for CadenceBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = self.step();
        if step > Duration::zero() && step.num_seconds() % 86_400 == 0 {
            write!(f, "{} missing day(s) between {} and {}", step.num_days() - 1, self.previous, self.next)
        } else {
            write!(f, "step of {}s between {} and {}", step.num_seconds(), self.previous, self.next)
        }
    }
}

/// First position where the series is not a strictly increasing daily grid
pub fn find_cadence_break(timestamps: &[NaiveDateTime]) -> Option<CadenceBreak> {
    let day = Duration::days(1);
    timestamps
        .windows(2)
        .enumerate()
        .find(|(_, w)| w[1] - w[0] != day)
        .map(|(i, w)| CadenceBreak {
            index: i + 1,
            previous: w[0],
            next: w[1],
        })
}

/// Reads one site's observations into a [`FlowSeries`]
#[derive(Debug, Clone)]
pub struct SeriesLoader {
    config: LoaderConfig,
    lookback_rows: usize,
    target_label: String,
}

impl Default for SeriesLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl SeriesLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            // max lag (30) + max rolling window (30) with the default feature set
            lookback_rows: 60,
            target_label: DEFAULT_TARGET.to_string(),
        }
    }

    /// Rows consumed by lag/rolling feature warm-up
    pub fn with_lookback_rows(mut self, rows: usize) -> Self {
        self.lookback_rows = rows;
        self
    }

    /// Label the value column is renamed to
    pub fn with_target_label(mut self, label: impl Into<String>) -> Self {
        self.target_label = label.into();
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Minimum number of observations a site needs
    pub fn required_rows(&self) -> usize {
        self.lookback_rows + self.config.min_usable_rows
    }

    /// Fetch and prepare the series of `site_id`
    pub fn load(&self, source: &dyn SeriesSource, site_id: &str) -> Result<FlowSeries> {
        debug!(site = site_id, source = %source.describe(), "Fetching observations");
        let observations = source.fetch(site_id)?;
        self.from_observations(site_id, observations)
    }

    /// Prepare a series from observations already in hand
    pub fn from_observations(&self, site_id: &str, mut observations: Vec<RawObservation>) -> Result<FlowSeries> {
        if observations.is_empty() {
            return Err(FlowcastError::DataUnavailable(format!("site {} returned no observations", site_id)));
        }

        let raw_count = observations.len();
        observations.retain(|o| o.value.is_finite());
        let dropped = raw_count - observations.len();
        if dropped > 0 {
            warn!(site = site_id, dropped, "Dropped observations without a finite value");
        }
        if observations.is_empty() {
            return Err(FlowcastError::DataUnavailable(format!(
                "site {} has no finite observations",
                site_id
            )));
        }

        // Stable sort keeps source order among equal timestamps, so the last
        // reported value for a day wins.
        observations.sort_by_key(|o| o.timestamp);
        let mut timestamps: Vec<NaiveDateTime> = Vec::with_capacity(observations.len());
        let mut values: Vec<f64> = Vec::with_capacity(observations.len());
        for obs in observations {
            if timestamps.last() == Some(&obs.timestamp) {
                if let Some(last) = values.last_mut() {
                    *last = obs.value;
                }
            } else {
                timestamps.push(obs.timestamp);
                values.push(obs.value);
            }
        }
        let duplicates = raw_count - dropped - timestamps.len();
        if duplicates > 0 {
            warn!(site = site_id, duplicates, "Collapsed duplicate timestamps (last value kept)");
        }

        let (timestamps, values) = match self.config.gap_policy {
            GapPolicy::Reject => {
                if let Some(gap) = find_cadence_break(&timestamps) {
                    return Err(FlowcastError::IrregularCadence(format!("site {}: {}", site_id, gap)));
                }
                (timestamps, values)
            }
            GapPolicy::Interpolate => fill_daily_gaps(site_id, timestamps, values)?,
        };

        let required = self.required_rows();
        if timestamps.len() < required {
            return Err(FlowcastError::InsufficientData {
                required,
                actual: timestamps.len(),
            });
        }

        info!(
            site = site_id,
            rows = timestamps.len(),
            start = %timestamps[0],
            end = %timestamps[timestamps.len() - 1],
            "Loaded discharge series"
        );

        Ok(FlowSeries::new(site_id, self.target_label.clone(), timestamps, values))
    }
}

/// Insert linearly interpolated values for every missing day
fn fill_daily_gaps(
    site_id: &str,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
) -> Result<(Vec<NaiveDateTime>, Vec<f64>)> {
    let day = Duration::days(1);
    let mut out_ts = Vec::with_capacity(timestamps.len());
    let mut out_vals = Vec::with_capacity(values.len());
    let mut filled = 0usize;

    for i in 0..timestamps.len() {
        if i > 0 {
            let step = timestamps[i] - timestamps[i - 1];
            if step.num_seconds() % 86_400 != 0 {
                let gap = CadenceBreak {
                    index: i,
                    previous: timestamps[i - 1],
                    next: timestamps[i],
                };
                return Err(FlowcastError::IrregularCadence(format!(
                    "site {}: {} cannot be resampled to whole days",
                    site_id, gap
                )));
            }
            let missing = step.num_days() - 1;
            for k in 1..=missing {
                let frac = k as f64 / step.num_days() as f64;
                out_ts.push(timestamps[i - 1] + day * k as i32);
                out_vals.push(values[i - 1] + (values[i] - values[i - 1]) * frac);
            }
            filled += missing.max(0) as usize;
        }
        out_ts.push(timestamps[i]);
        out_vals.push(values[i]);
    }

    if filled > 0 {
        warn!(site = site_id, filled, "Interpolated missing days");
    }
    Ok((out_ts, out_vals))
}
