//! Experiment Tracker Implementation
//!
//! Track runs with their parameters, metrics, tags and artifacts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::storage::{LocalStorage, StorageBackend};
use crate::error::{FlowcastError, Result};

/// A run within an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Run ID
    pub run_id: String,
    /// Run name
    pub run_name: String,
    /// Start time (unix seconds)
    pub start_time: i64,
    /// End time (None if still running)
    pub end_time: Option<i64>,
    /// Parameters
    pub params: BTreeMap<String, String>,
    /// Latest metrics
    pub metrics: BTreeMap<String, f64>,
    /// Tags
    pub tags: BTreeMap<String, String>,
    /// Artifact paths
    pub artifacts: Vec<String>,
    /// Status
    pub status: RunStatus,
}

impl Run {
    /// Create a new run
    pub fn new(run_id: impl Into<String>, run_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            run_name: run_name.into(),
            start_time: current_timestamp(),
            end_time: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            artifacts: Vec::new(),
            status: RunStatus::Running,
        }
    }

    /// Get run duration in seconds
    pub fn duration_secs(&self) -> i64 {
        let end = self.end_time.unwrap_or_else(current_timestamp);
        end - self.start_time
    }
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is currently running
    Running,
    /// Run completed successfully
    Finished,
    /// Run failed
    Failed,
}

/// An experiment containing multiple runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Experiment name, also its identifier
    pub name: String,
    /// Creation time
    pub created_at: i64,
    /// Runs in this experiment
    pub runs: Vec<Run>,
}

impl Experiment {
    /// Create a new experiment
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: current_timestamp(),
            runs: Vec::new(),
        }
    }

    pub fn run(&self, run_id: &str) -> Option<&Run> {
        self.runs.iter().find(|r| r.run_id == run_id)
    }

    /// Get the best finished run by a metric
    pub fn best_run(&self, metric_name: &str, maximize: bool) -> Option<&Run> {
        self.runs
            .iter()
            .filter(|r| r.status == RunStatus::Finished)
            .filter_map(|r| r.metrics.get(metric_name).map(|v| (r, *v)))
            .max_by(|(_, a), (_, b)| if maximize { a.total_cmp(b) } else { b.total_cmp(a) })
            .map(|(r, _)| r)
    }
}

/// Experiment tracker
pub struct ExperimentTracker {
    storage: Box<dyn StorageBackend + Send + Sync>,
    experiment: Experiment,
    current_run: Option<Run>,
}

impl ExperimentTracker {
    /// Open (or create) experiment `name` in `storage`
    pub fn new(storage: Box<dyn StorageBackend + Send + Sync>, name: &str) -> Result<Self> {
        let experiment = storage
            .load_experiments()?
            .into_iter()
            .find(|e| e.name == name)
            .unwrap_or_else(|| Experiment::new(name));

        Ok(Self {
            storage,
            experiment,
            current_run: None,
        })
    }

    /// Tracker backed by JSON files under `output_dir`
    pub fn with_dir(output_dir: impl Into<PathBuf>, name: &str) -> Result<Self> {
        Self::new(Box::new(LocalStorage::new(output_dir.into())), name)
    }

    /// Start a new run
    pub fn start_run(&mut self, run_name: impl Into<String>) -> Result<String> {
        if let Some(run) = &self.current_run {
            return Err(FlowcastError::ConfigError(format!(
                "run {} is still active",
                run.run_id
            )));
        }
        let run_id = format!("run_{}_{}", current_timestamp(), self.experiment.runs.len() + 1);
        debug!(experiment = %self.experiment.name, run = %run_id, "Started run");
        self.current_run = Some(Run::new(run_id.clone(), run_name));
        Ok(run_id)
    }

    fn active(&mut self) -> Result<&mut Run> {
        self.current_run
            .as_mut()
            .ok_or_else(|| FlowcastError::ConfigError("no active run".to_string()))
    }

    /// Log a parameter
    pub fn log_param(&mut self, key: impl Into<String>, value: impl ToString) -> Result<()> {
        self.active()?.params.insert(key.into(), value.to_string());
        Ok(())
    }

    /// Log a metric
    pub fn log_metric(&mut self, name: impl Into<String>, value: f64) -> Result<()> {
        self.active()?.metrics.insert(name.into(), value);
        Ok(())
    }

    /// Log a tag
    pub fn log_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.active()?.tags.insert(key.into(), value.into());
        Ok(())
    }

    /// Log an artifact path
    pub fn log_artifact(&mut self, path: impl Into<String>) -> Result<()> {
        self.active()?.artifacts.push(path.into());
        Ok(())
    }

    /// End the current run and persist the experiment
    pub fn end_run(&mut self, status: RunStatus) -> Result<Run> {
        let mut run = self
            .current_run
            .take()
            .ok_or_else(|| FlowcastError::ConfigError("no active run".to_string()))?;
        run.end_time = Some(current_timestamp());
        run.status = status;

        self.experiment.runs.push(run.clone());
        self.save()?;
        debug!(run = %run.run_id, status = ?status, "Ended run");
        Ok(run)
    }

    /// Get the current run
    pub fn current_run(&self) -> Option<&Run> {
        self.current_run.as_ref()
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    /// Save the experiment, replacing any stored experiment of the same name
    pub fn save(&self) -> Result<()> {
        let mut experiments = self.storage.load_experiments()?;
        experiments.retain(|e| e.name != self.experiment.name);
        experiments.push(self.experiment.clone());
        self.storage.save_experiments(&experiments)
    }
}

fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_basic() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ExperimentTracker::with_dir(dir.path(), "test_experiment").unwrap();

        let run_id = tracker.start_run("run_1").unwrap();
        assert!(run_id.starts_with("run_"));

        tracker.log_param("n_estimators", 100).unwrap();
        tracker.log_metric("r2", 0.91).unwrap();
        tracker.log_tag("comid", "620883808").unwrap();
        let run = tracker.end_run(RunStatus::Finished).unwrap();

        assert_eq!(run.status, RunStatus::Finished);
        assert_eq!(run.params.get("n_estimators").map(String::as_str), Some("100"));
        assert_eq!(tracker.experiment().runs.len(), 1);
        assert!(tracker.current_run().is_none());
    }

    #[test]
    fn test_runs_persist_across_trackers() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut tracker = ExperimentTracker::with_dir(dir.path(), "exp").unwrap();
            tracker.start_run("a").unwrap();
            tracker.end_run(RunStatus::Failed).unwrap();
        }
        let mut tracker = ExperimentTracker::with_dir(dir.path(), "exp").unwrap();
        assert_eq!(tracker.experiment().runs.len(), 1);
        let second = tracker.start_run("b").unwrap();
        tracker.end_run(RunStatus::Finished).unwrap();

        let reopened = ExperimentTracker::with_dir(dir.path(), "exp").unwrap();
        assert_eq!(reopened.experiment().runs.len(), 2);
        assert_eq!(reopened.experiment().runs[0].status, RunStatus::Failed);
        assert!(reopened.experiment().run(&second).is_some());
    }

    #[test]
    fn test_logging_requires_active_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ExperimentTracker::with_dir(dir.path(), "exp").unwrap();
        assert!(tracker.log_metric("r2", 1.0).is_err());
        tracker.start_run("a").unwrap();
        assert!(tracker.start_run("b").is_err());
    }

    #[test]
    fn test_best_run() {
        let mut exp = Experiment::new("test");

        let mut run1 = Run::new("1", "run1");
        run1.metrics.insert("r2".to_string(), 0.8);
        run1.status = RunStatus::Finished;

        let mut run2 = Run::new("2", "run2");
        run2.metrics.insert("r2".to_string(), 0.95);
        run2.status = RunStatus::Finished;

        let mut run3 = Run::new("3", "run3");
        run3.metrics.insert("r2".to_string(), 0.99);
        run3.status = RunStatus::Failed;

        exp.runs = vec![run1, run2, run3];

        let best = exp.best_run("r2", true).unwrap();
        assert_eq!(best.run_id, "2");
        assert_eq!(exp.best_run("r2", false).unwrap().run_id, "1");
    }
}
