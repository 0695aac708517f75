//! Discharge series loading
//!
//! Turns raw `(timestamp, value)` observations for one site into a sorted,
//! deduplicated daily [`FlowSeries`]:
//! - [`SeriesSource`] abstracts where observations come from
//! - [`SeriesLoader`] validates, orders and regularizes them

mod loader;
mod source;

pub use loader::{find_cadence_break, CadenceBreak, GapPolicy, LoaderConfig, SeriesLoader};
pub use source::{InMemorySource, SeriesSource};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Default name of the target column
pub const DEFAULT_TARGET: &str = "flow";

/// A single raw measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

impl RawObservation {
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered discharge series for one site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSeries {
    site_id: String,
    target_label: String,
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl FlowSeries {
    /// Wrap already ordered columns. No validation happens here; the loader and
    /// the feature builder check their own preconditions.
    pub fn new(
        site_id: impl Into<String>,
        target_label: impl Into<String>,
        timestamps: Vec<NaiveDateTime>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            site_id: site_id.into(),
            target_label: target_label.into(),
            timestamps,
            values,
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Name of the value column
    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// First timestamp
    pub fn start(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    /// Last timestamp
    pub fn end(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    /// Iterate as observations
    pub fn observations(&self) -> impl Iterator<Item = RawObservation> + '_ {
        self.timestamps
            .iter()
            .zip(self.values.iter())
            .map(|(&timestamp, &value)| RawObservation { timestamp, value })
    }
}
