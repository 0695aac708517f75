//! Observation sources

use super::RawObservation;
use crate::error::{FlowcastError, Result};
use std::collections::HashMap;

/// Anything that can hand over the raw observations of one site.
///
/// Retrieval, retries and timeouts belong to the implementor; the loader only
/// sees the materialized observations.
pub trait SeriesSource {
    /// Fetch all observations recorded for `site_id`
    fn fetch(&self, site_id: &str) -> Result<Vec<RawObservation>>;

    /// Short description used in log lines
    fn describe(&self) -> String {
        "series source".to_string()
    }
}

/// Source backed by observations already held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<String, Vec<RawObservation>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register observations for a site, replacing any previous ones
    pub fn with_series(mut self, site_id: impl Into<String>, observations: Vec<RawObservation>) -> Self {
        self.series.insert(site_id.into(), observations);
        self
    }

    pub fn insert(&mut self, site_id: impl Into<String>, observations: Vec<RawObservation>) {
        self.series.insert(site_id.into(), observations);
    }
}

impl SeriesSource for InMemorySource {
    fn fetch(&self, site_id: &str) -> Result<Vec<RawObservation>> {
        self.series
            .get(site_id)
            .cloned()
            .ok_or_else(|| FlowcastError::DataUnavailable(format!("no series registered for site {}", site_id)))
    }

    fn describe(&self) -> String {
        format!("in-memory ({} sites)", self.series.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;

    #[test]
    fn test_missing_site_is_unavailable() {
        let source = InMemorySource::new();
        let err = source.fetch("620883808").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn test_fetch_registered_site() {
        let ts = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let source = InMemorySource::new().with_series("42", vec![RawObservation::new(ts, 3.5)]);
        let obs = source.fetch("42").unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].value, 3.5);
    }
}
