//! Scoring a trained model on the held-out partition

use super::metrics::RegressionMetrics;
use crate::error::{FlowcastError, Result};
use crate::timeseries::FeatureTable;
use crate::training::TrainedModel;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One entry of the importance ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Normalized score; all scores sum to 1
    pub importance: f64,
    /// 1-based position in the descending ranking
    pub rank: usize,
}

/// Predictions, metrics and importance ranking for a test partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// One prediction per test row, in row order
    pub predictions: Array1<f64>,
    pub metrics: RegressionMetrics,
    /// Every training feature exactly once, most important first
    pub importances: Vec<FeatureImportance>,
}

impl EvaluationResult {
    /// The `n` most important features
    pub fn top_features(&self, n: usize) -> Vec<&str> {
        self.importances
            .iter()
            .take(n)
            .map(|fi| fi.feature.as_str())
            .collect()
    }

    pub fn importance_of(&self, feature: &str) -> Option<f64> {
        self.importances
            .iter()
            .find(|fi| fi.feature == feature)
            .map(|fi| fi.importance)
    }
}

/// Rank features by importance, descending. Ties keep training column order.
pub fn rank_importances(names: &[String], scores: &Array1<f64>) -> Vec<FeatureImportance> {
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| {
        let sa = scores.get(a).copied().unwrap_or(0.0);
        let sb = scores.get(b).copied().unwrap_or(0.0);
        sb.total_cmp(&sa)
    });

    order
        .into_iter()
        .enumerate()
        .map(|(pos, idx)| FeatureImportance {
            feature: names[idx].clone(),
            importance: scores.get(idx).copied().unwrap_or(0.0),
            rank: pos + 1,
        })
        .collect()
}

/// Scores a [`TrainedModel`] against held-out targets
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        model: &TrainedModel,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
        feature_names: &[String],
    ) -> Result<EvaluationResult> {
        if feature_names != model.feature_names() {
            return Err(FlowcastError::FeatureMismatch {
                expected: model.feature_names().to_vec(),
                actual: feature_names.to_vec(),
            });
        }
        if x_test.nrows() != y_test.len() {
            return Err(FlowcastError::ShapeError {
                expected: format!("{} targets", x_test.nrows()),
                actual: format!("{} targets", y_test.len()),
            });
        }

        let predictions = model.predict(x_test, feature_names)?;
        if predictions.len() != y_test.len() {
            return Err(FlowcastError::ShapeError {
                expected: format!("{} predictions", y_test.len()),
                actual: format!("{} predictions", predictions.len()),
            });
        }

        let metrics = RegressionMetrics::compute(y_test, &predictions)?;
        let importances = rank_importances(model.feature_names(), &model.feature_importances());

        info!(
            rows = metrics.n_samples,
            mae = metrics.mae,
            rmse = metrics.rmse,
            r2 = metrics.r2,
            "Evaluated model on test partition"
        );

        Ok(EvaluationResult {
            predictions,
            metrics,
            importances,
        })
    }

    pub fn evaluate_table(&self, model: &TrainedModel, test: &FeatureTable) -> Result<EvaluationResult> {
        self.evaluate(model, test.features(), test.target(), test.feature_names())
    }
}
