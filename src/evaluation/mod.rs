//! Model evaluation
//!
//! Scores held-out predictions, ranks feature importances and assembles the
//! per-row result table consumed by reporting.

mod evaluator;
mod metrics;
mod results;

pub use evaluator::{rank_importances, EvaluationResult, Evaluator, FeatureImportance};
pub use metrics::RegressionMetrics;
pub use results::{ErrorSummary, Histogram, ResultAssembler, ResultRow, ResultTable};
