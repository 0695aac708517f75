//! Pipeline configuration

use crate::error::{FlowcastError, Result};
use crate::series::{LoaderConfig, DEFAULT_TARGET};
use crate::timeseries::FeatureConfig;
use crate::training::ForestParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one forecasting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Monitoring point (COMID) the series belongs to
    pub site_id: String,

    /// Share of the latest timestamps held out for testing
    pub test_fraction: f64,

    /// Name the discharge column is given after loading
    pub target_label: String,

    /// Lag, rolling-window and calendar feature settings
    pub features: FeatureConfig,

    /// Minimum history and gap handling
    pub loader: LoaderConfig,

    /// Forest hyperparameters
    pub forest: ForestParams,

    /// Actual flows at or below this magnitude have no percent error
    pub zero_flow_tolerance: f64,

    /// Bins of the error histograms in the run summary
    pub histogram_bins: usize,

    /// Free-text description of where the series came from
    pub data_source: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            site_id: String::new(),
            test_fraction: 0.3,
            target_label: DEFAULT_TARGET.to_string(),
            features: FeatureConfig::default(),
            loader: LoaderConfig::default(),
            forest: ForestParams::default(),
            zero_flow_tolerance: 1e-6,
            histogram_bins: 30,
            data_source: "geoglows_retrospective".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            ..Self::default()
        }
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_forest(mut self, forest: ForestParams) -> Self {
        self.forest = forest;
        self
    }

    pub fn with_zero_flow_tolerance(mut self, tolerance: f64) -> Self {
        self.zero_flow_tolerance = tolerance;
        self
    }

    pub fn with_data_source(mut self, source: impl Into<String>) -> Self {
        self.data_source = source.into();
        self
    }

    /// Read a configuration from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FlowcastError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| FlowcastError::ConfigError(format!("invalid {}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.site_id.trim().is_empty() {
            return Err(FlowcastError::ConfigError("site_id is required".to_string()));
        }
        if self.target_label.trim().is_empty() {
            return Err(FlowcastError::ConfigError("target_label must not be empty".to_string()));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(FlowcastError::InvalidParameter {
                name: "test_fraction".to_string(),
                value: self.test_fraction.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }
        if !(self.zero_flow_tolerance >= 0.0) {
            return Err(FlowcastError::InvalidParameter {
                name: "zero_flow_tolerance".to_string(),
                value: self.zero_flow_tolerance.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        if self.histogram_bins == 0 {
            return Err(FlowcastError::InvalidParameter {
                name: "histogram_bins".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.features.validate()?;
        self.forest.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::GapPolicy;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new("620883808");
        assert_eq!(config.test_fraction, 0.3);
        assert_eq!(config.target_label, "flow");
        assert_eq!(config.forest.n_estimators, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(PipelineConfig::default().validate().is_err());
        assert!(PipelineConfig::new("1").with_test_fraction(1.0).validate().is_err());
        assert!(PipelineConfig::new("1").with_zero_flow_tolerance(-1.0).validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "site_id": "620883808", "test_fraction": 0.25,
                 "loader": { "gap_policy": "interpolate" },
                 "forest": { "n_estimators": 10, "max_features": "sqrt" } }"#,
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.site_id, "620883808");
        assert_eq!(config.test_fraction, 0.25);
        assert_eq!(config.loader.gap_policy, GapPolicy::Interpolate);
        assert_eq!(config.loader.min_usable_rows, 100);
        assert_eq!(config.forest.n_estimators, 10);
        assert_eq!(config.forest.max_depth, Some(20));
        assert_eq!(config.features.lags, vec![1, 2, 3, 7, 15, 30]);
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_json_file("/nonexistent/flowcast.json").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
