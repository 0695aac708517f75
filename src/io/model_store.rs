//! Persisted models

use crate::error::{FlowcastError, Result};
use crate::timeseries::{FeatureBuilder, FeatureConfig};
use crate::training::TrainedModel;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A trained model with everything needed to rebuild its input features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredModel {
    pub site_id: String,
    pub target_label: String,
    pub features: FeatureConfig,
    pub trained_at: NaiveDateTime,
    pub model: TrainedModel,
}

impl StoredModel {
    pub fn new(
        site_id: impl Into<String>,
        target_label: impl Into<String>,
        features: FeatureConfig,
        trained_at: NaiveDateTime,
        model: TrainedModel,
    ) -> Self {
        Self {
            site_id: site_id.into(),
            target_label: target_label.into(),
            features,
            trained_at,
            model,
        }
    }

    /// Feature builder producing the columns this model was trained on
    pub fn feature_builder(&self) -> FeatureBuilder {
        FeatureBuilder::new(self.features.clone()).with_target_label(self.target_label.clone())
    }

    /// Check that the stored feature settings still yield the stored feature names
    pub fn check_consistency(&self) -> Result<()> {
        let names = self.feature_builder().feature_names();
        if names != self.model.feature_names() {
            return Err(FlowcastError::FeatureMismatch {
                expected: self.model.feature_names().to_vec(),
                actual: names,
            });
        }
        Ok(())
    }
}

/// Save a model as pretty-printed JSON
pub fn save_model(model: &StoredModel, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(model)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), "Saved model");
    Ok(())
}

/// Load a model saved with [`save_model`]
pub fn load_model(path: impl AsRef<Path>) -> Result<StoredModel> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let model: StoredModel = serde_json::from_str(&json)?;
    model.check_consistency()?;
    Ok(model)
}
