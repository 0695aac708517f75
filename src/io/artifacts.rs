//! Run artifacts: prediction and importance CSVs, model and metrics JSON

use super::model_store::{save_model, StoredModel};
use crate::error::{FlowcastError, Result};
use crate::evaluation::{FeatureImportance, ResultTable};
use crate::pipeline::{PipelineOutput, RunSummary};
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Paths of the files written for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactPaths {
    pub predictions: PathBuf,
    pub importances: PathBuf,
    pub model: PathBuf,
    pub metrics: PathBuf,
}

impl ArtifactPaths {
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [&self.predictions, &self.importances, &self.model, &self.metrics]
            .into_iter()
            .map(|p| p.as_path())
    }
}

#[derive(Serialize)]
struct MetricsReport<'a> {
    summary: &'a RunSummary,
    importances: &'a [FeatureImportance],
}

/// Writes the artifacts of a run under one directory.
///
/// Every file name starts with `<site>_<run timestamp>_` so runs for different
/// sites or at different times never overwrite each other.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    prefix: String,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>, site_id: &str, run_timestamp: NaiveDateTime) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: format!("{}_{}", site_id, run_timestamp.format("%Y%m%d_%H%M%S")),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Full path of artifact `name`
    pub fn path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{}", self.prefix, name))
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    pub fn write_predictions(&self, results: &ResultTable) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.path("model_predictions.csv");
        write_predictions_csv(results, &path)?;
        Ok(path)
    }

    pub fn write_importances(&self, importances: &[FeatureImportance]) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.path("feature_importance.csv");
        write_importance_csv(importances, &path)?;
        Ok(path)
    }

    pub fn write_model(&self, model: &StoredModel) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.path("trained_model.json");
        save_model(model, &path)?;
        Ok(path)
    }

    pub fn write_metrics(&self, summary: &RunSummary, importances: &[FeatureImportance]) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.path("metrics.json");
        let report = MetricsReport { summary, importances };
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        Ok(path)
    }

    /// Write every artifact of a successful run
    pub fn write_all(&self, output: &PipelineOutput, model: &StoredModel) -> Result<ArtifactPaths> {
        let paths = ArtifactPaths {
            predictions: self.write_predictions(&output.results)?,
            importances: self.write_importances(&output.evaluation.importances)?,
            model: self.write_model(model)?,
            metrics: self.write_metrics(&output.summary, &output.evaluation.importances)?,
        };
        info!(dir = %self.output_dir.display(), prefix = %self.prefix, "Wrote run artifacts");
        Ok(paths)
    }
}

fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .finish(df)
        .map_err(|e| FlowcastError::DataError(format!("{}: {}", path.display(), e)))
}

/// Row-level results as `time,flow,flow_pred,error,error_abs,error_pct,error_pct_defined`.
/// Undefined percent errors are written as empty cells.
pub fn write_predictions_csv(results: &ResultTable, path: &Path) -> Result<()> {
    let rows = &results.rows;
    let mut df = DataFrame::new(vec![
        Series::new(
            "time".into(),
            rows.iter().map(|r| r.timestamp.format(TIME_FORMAT).to_string()).collect::<Vec<_>>(),
        ),
        Series::new("flow".into(), rows.iter().map(|r| r.actual).collect::<Vec<_>>()),
        Series::new("flow_pred".into(), rows.iter().map(|r| r.predicted).collect::<Vec<_>>()),
        Series::new("error".into(), rows.iter().map(|r| r.error).collect::<Vec<_>>()),
        Series::new("error_abs".into(), rows.iter().map(|r| r.abs_error).collect::<Vec<_>>()),
        Series::new("error_pct".into(), rows.iter().map(|r| r.percent_error).collect::<Vec<_>>()),
        Series::new(
            "error_pct_defined".into(),
            rows.iter().map(|r| r.percent_defined()).collect::<Vec<_>>(),
        ),
    ])?;
    write_frame(&mut df, path)
}

/// Importance ranking as `feature,importance,rank`, most important first
pub fn write_importance_csv(importances: &[FeatureImportance], path: &Path) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Series::new(
            "feature".into(),
            importances.iter().map(|f| f.feature.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "importance".into(),
            importances.iter().map(|f| f.importance).collect::<Vec<_>>(),
        ),
        Series::new(
            "rank".into(),
            importances.iter().map(|f| f.rank as u32).collect::<Vec<_>>(),
        ),
    ])?;
    write_frame(&mut df, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ResultAssembler;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_artifact_names_are_prefixed() {
        let writer = ArtifactWriter::new("/tmp/out", "620883808", start() + Duration::seconds(3725));
        assert_eq!(
            writer.path("metrics.json"),
            PathBuf::from("/tmp/out/620883808_20230701_010205_metrics.json")
        );
    }

    #[test]
    fn test_write_predictions_csv() {
        let dir = tempfile::tempdir().unwrap();
        let ts = vec![start(), start() + Duration::days(1)];
        let table = ResultAssembler::default()
            .assemble("s", &ts, &[0.0, 2.0], &[1.0, 1.0])
            .unwrap();

        let writer = ArtifactWriter::new(dir.path().join("nested"), "s", start());
        let path = writer.write_predictions(&table).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "time,flow,flow_pred,error,error_abs,error_pct,error_pct_defined");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2023-07-01 00:00:00,"));
        assert!(lines[1].ends_with(",,false"));
        assert!(lines[2].ends_with(",true"));
    }

    #[test]
    fn test_write_importance_csv() {
        let dir = tempfile::tempdir().unwrap();
        let importances = vec![
            FeatureImportance { feature: "flow_lag_1".into(), importance: 0.75, rank: 1 },
            FeatureImportance { feature: "month".into(), importance: 0.25, rank: 2 },
        ];
        let path = dir.path().join("imp.csv");
        write_importance_csv(&importances, &path).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().next(), Some("feature,importance,rank"));
        assert_eq!(text.lines().nth(1), Some("flow_lag_1,0.75,1"));
    }
}
