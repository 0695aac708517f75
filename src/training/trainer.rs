//! Forest trainer and the fitted model it produces

use super::random_forest::{MaxFeatures, RandomForest};
use crate::error::{FlowcastError, Result};
use crate::timeseries::FeatureTable;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: u64,
    /// Worker threads; all available cores when unset
    pub n_jobs: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(20),
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: 42,
            n_jobs: None,
        }
    }
}

impl ForestParams {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| FlowcastError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "0".into(), "must be at least 1"));
        }
        if self.max_depth == Some(0) {
            return Err(invalid("max_depth", "0".into(), "must be at least 1 when set"));
        }
        if self.min_samples_split < 2 {
            return Err(invalid(
                "min_samples_split",
                self.min_samples_split.to_string(),
                "must be at least 2",
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf", "0".into(), "must be at least 1"));
        }
        if self.n_jobs == Some(0) {
            return Err(invalid("n_jobs", "0".into(), "must be at least 1 when set"));
        }
        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(invalid("max_features", f.to_string(), "fraction must lie in (0, 1]"));
            }
            MaxFeatures::Fixed(0) => {
                return Err(invalid("max_features", "0".into(), "must be at least 1"));
            }
            _ => {}
        }
        Ok(())
    }

    fn forest(&self) -> RandomForest {
        let mut forest = RandomForest::new(self.n_estimators)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(self.max_features)
            .with_bootstrap(self.bootstrap)
            .with_random_state(self.random_state);
        if let Some(depth) = self.max_depth {
            forest = forest.with_max_depth(depth);
        }
        if let Some(n_jobs) = self.n_jobs {
            forest = forest.with_n_jobs(n_jobs);
        }
        forest
    }
}

/// A fitted forest together with the feature names it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    forest: RandomForest,
    feature_names: Vec<String>,
    params: ForestParams,
    n_train_rows: usize,
    training_time_secs: f64,
}

impl TrainedModel {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_train_rows(&self) -> usize {
        self.n_train_rows
    }

    pub fn training_time_secs(&self) -> f64 {
        self.training_time_secs
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Normalized importances, aligned with [`Self::feature_names`]
    pub fn feature_importances(&self) -> Array1<f64> {
        self.forest
            .feature_importances()
            .cloned()
            .unwrap_or_else(|| Array1::zeros(self.feature_names.len()))
    }

    /// Predict rows whose columns are named `names`, in order
    pub fn predict(&self, x: &Array2<f64>, names: &[String]) -> Result<Array1<f64>> {
        if names != self.feature_names.as_slice() {
            return Err(FlowcastError::FeatureMismatch {
                expected: self.feature_names.clone(),
                actual: names.to_vec(),
            });
        }
        if x.ncols() != names.len() {
            return Err(FlowcastError::ShapeError {
                expected: format!("{} columns", names.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        if x.nrows() == 0 {
            return Ok(Array1::zeros(0));
        }
        self.forest.predict(x)
    }

    pub fn predict_table(&self, table: &FeatureTable) -> Result<Array1<f64>> {
        self.predict(table.features(), table.feature_names())
    }
}

/// Fits a random forest regressor
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    params: ForestParams,
}

impl Trainer {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, feature_names: &[String]) -> Result<TrainedModel> {
        self.params.validate()?;

        if x.nrows() == 0 {
            return Err(FlowcastError::TrainingError("training set is empty".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(FlowcastError::ShapeError {
                expected: format!("{} targets", x.nrows()),
                actual: format!("{} targets", y.len()),
            });
        }
        if x.ncols() != feature_names.len() {
            return Err(FlowcastError::ShapeError {
                expected: format!("{} named columns", feature_names.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(FlowcastError::TrainingError(
                "training data contains non-finite values".to_string(),
            ));
        }

        let start = Instant::now();
        let mut forest = self.params.forest();
        forest.fit(x, y)?;
        let training_time_secs = start.elapsed().as_secs_f64();

        info!(
            trees = forest.n_trees(),
            rows = x.nrows(),
            features = x.ncols(),
            seconds = training_time_secs,
            "Trained random forest"
        );

        Ok(TrainedModel {
            forest,
            feature_names: feature_names.to_vec(),
            params: self.params.clone(),
            n_train_rows: x.nrows(),
            training_time_secs,
        })
    }

    pub fn fit_table(&self, table: &FeatureTable) -> Result<TrainedModel> {
        self.fit(table.features(), table.target(), table.feature_names())
    }
}
