//! Experiment tracking
//!
//! File-backed run tracking, fed from finished pipeline outputs. The pipeline
//! itself knows nothing about tracking; callers translate its results here.

mod storage;
mod tracker;

pub use storage::{LocalStorage, StorageBackend};
pub use tracker::{Experiment, ExperimentTracker, Run, RunStatus};

use crate::config::PipelineConfig;
use crate::error::{FlowcastError, Result};
use crate::io::ArtifactPaths;
use crate::pipeline::PipelineOutput;

/// Default experiment name for discharge runs
pub const DEFAULT_EXPERIMENT: &str = "flow_prediction";

fn log_run_tags(tracker: &mut ExperimentTracker, config: &PipelineConfig) -> Result<()> {
    tracker.log_tag("comid", config.site_id.clone())?;
    tracker.log_tag("model_purpose", "hydrological_forecast")?;
    tracker.log_tag("data_source", config.data_source.clone())?;
    Ok(())
}

/// Record a successful run with its parameters, metrics and artifacts
pub fn record_success(
    tracker: &mut ExperimentTracker,
    config: &PipelineConfig,
    output: &PipelineOutput,
    artifacts: Option<&ArtifactPaths>,
) -> Result<Run> {
    let s = &output.summary;
    tracker.start_run(format!("{}_{}", s.site_id, s.run_timestamp.format("%Y%m%d_%H%M%S")))?;
    log_run_tags(tracker, config)?;

    tracker.log_param("data_records", s.data_records)?;
    tracker.log_param("data_start_date", s.data_start)?;
    tracker.log_param("data_end_date", s.data_end)?;
    tracker.log_param("usable_start_date", s.usable_start)?;
    tracker.log_param("features_created", s.features_created)?;
    tracker.log_param("train_size", s.train_size)?;
    tracker.log_param("test_size", s.test_size)?;
    tracker.log_param("test_split_ratio", s.test_fraction)?;
    tracker.log_param("split_boundary", s.split_boundary)?;
    tracker.log_param("model_type", "RandomForest")?;
    tracker.log_param("n_estimators", s.params.n_estimators)?;
    tracker.log_param(
        "max_depth",
        s.params.max_depth.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string()),
    )?;
    tracker.log_param("min_samples_split", s.params.min_samples_split)?;
    tracker.log_param("min_samples_leaf", s.params.min_samples_leaf)?;
    tracker.log_param("random_state", s.params.random_state)?;

    for (name, value) in s.metrics.as_pairs() {
        tracker.log_metric(name, value)?;
    }
    if let Some(mape) = s.error_summary.mape {
        tracker.log_metric("mape", mape)?;
    }
    tracker.log_metric("undefined_percent_rows", s.error_summary.undefined_percent_rows as f64)?;
    tracker.log_metric("training_time_secs", s.training_time_secs)?;

    if let Some(paths) = artifacts {
        for path in paths.iter() {
            tracker.log_artifact(path.display().to_string())?;
        }
    }

    tracker.end_run(RunStatus::Finished)
}

/// Record a failed run. No metrics are logged, only the failing stage and error kind.
pub fn record_failure(
    tracker: &mut ExperimentTracker,
    config: &PipelineConfig,
    error: &FlowcastError,
) -> Result<Run> {
    tracker.start_run(format!("{}_failed", config.site_id))?;
    log_run_tags(tracker, config)?;

    let stage = error
        .stage()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "setup".to_string());
    tracker.log_tag("failed_stage", stage)?;
    tracker.log_tag("error_kind", error.kind().to_string())?;
    tracker.log_param("error", error)?;
    tracker.log_param("test_split_ratio", config.test_fraction)?;
    tracker.log_param("n_estimators", config.forest.n_estimators)?;

    tracker.end_run(RunStatus::Failed)
}
