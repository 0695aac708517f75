//! End-to-end forecasting run
//!
//! Loader, feature builder, temporal splitter, trainer, evaluator and result
//! assembler run strictly in sequence; each stage consumes the previous stage's
//! complete output. Failures are tagged with the stage they came from.

use crate::config::PipelineConfig;
use crate::error::{FlowcastError, Result, Stage};
use crate::evaluation::{ErrorSummary, EvaluationResult, Evaluator, RegressionMetrics, ResultAssembler, ResultTable};
use crate::series::{FlowSeries, RawObservation, SeriesLoader, SeriesSource};
use crate::timeseries::{FeatureBuilder, FeatureTable, TemporalSplit, TemporalSplitter};
use crate::training::{ForestParams, TrainedModel, Trainer};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Plain description of a finished run, suitable for tracking and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub site_id: String,
    /// Wall-clock start of the run (UTC)
    pub run_timestamp: NaiveDateTime,
    /// Observations after sorting, deduplication and gap handling
    pub data_records: usize,
    pub data_start: NaiveDateTime,
    pub data_end: NaiveDateTime,
    /// First timestamp with every feature defined
    pub usable_start: NaiveDateTime,
    pub usable_rows: usize,
    pub features_created: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub split_boundary: NaiveDateTime,
    pub test_fraction: f64,
    pub params: ForestParams,
    pub metrics: RegressionMetrics,
    pub error_summary: ErrorSummary,
    pub training_time_secs: f64,
}

/// Everything a successful run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub model: TrainedModel,
    pub evaluation: EvaluationResult,
    pub results: ResultTable,
    pub summary: RunSummary,
}

/// Runs the six forecasting stages for one site
#[derive(Debug, Clone)]
pub struct FlowPipeline {
    config: PipelineConfig,
}

impl FlowPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn loader(&self) -> SeriesLoader {
        SeriesLoader::new(self.config.loader.clone())
            .with_lookback_rows(self.config.features.lookback_rows())
            .with_target_label(self.config.target_label.clone())
    }

    fn feature_builder(&self) -> FeatureBuilder {
        FeatureBuilder::new(self.config.features.clone()).with_target_label(self.config.target_label.clone())
    }

    /// Load the configured site from `source` and run every stage
    pub fn run(&self, source: &dyn SeriesSource) -> Result<PipelineOutput> {
        self.preflight()?;
        let series = self
            .loader()
            .load(source, &self.config.site_id)
            .map_err(|e| self.failed(e.at(Stage::Load)))?;
        self.run_series(&series)
    }

    /// Run every stage on observations already in hand
    pub fn run_observations(&self, observations: Vec<RawObservation>) -> Result<PipelineOutput> {
        self.preflight()?;
        let series = self
            .loader()
            .from_observations(&self.config.site_id, observations)
            .map_err(|e| self.failed(e.at(Stage::Load)))?;
        self.run_series(&series)
    }

    /// Run the stages after loading on a prepared series
    pub fn run_series(&self, series: &FlowSeries) -> Result<PipelineOutput> {
        self.preflight()?;
        let run_timestamp = Utc::now().naive_utc();

        self.execute(series, run_timestamp).map_err(|e| self.failed(e))
    }

    /// Settings checks that run before any stage. An unusable test fraction is
    /// reported by the splitter, so it carries the split stage.
    fn preflight(&self) -> Result<()> {
        TemporalSplitter::new(self.config.test_fraction)
            .validate()
            .map_err(|e| self.failed(e.at(Stage::Split)))?;
        self.config.validate().map_err(|e| self.failed(e))
    }

    fn failed(&self, e: FlowcastError) -> FlowcastError {
        error!(
            site = %self.config.site_id,
            stage = ?e.stage(),
            kind = %e.kind(),
            "Run failed: {}",
            e
        );
        e
    }

    /// Build the feature table of `series` with this pipeline's settings
    pub fn features(&self, series: &FlowSeries) -> Result<FeatureTable> {
        self.feature_builder().build(series).map_err(|e| e.at(Stage::Features))
    }

    fn execute(&self, series: &FlowSeries, run_timestamp: NaiveDateTime) -> Result<PipelineOutput> {
        let table = self.features(series)?;

        let TemporalSplit { train, test, boundary } = TemporalSplitter::new(self.config.test_fraction)
            .split(&table)
            .map_err(|e| e.at(Stage::Split))?;

        let model = Trainer::new(self.config.forest.clone())
            .fit_table(&train)
            .map_err(|e| e.at(Stage::Train))?;

        let evaluation = Evaluator::new()
            .evaluate_table(&model, &test)
            .map_err(|e| e.at(Stage::Evaluate))?;

        let results = ResultAssembler::new(self.config.zero_flow_tolerance)
            .assemble_evaluation(&test, &evaluation)
            .map_err(|e| e.at(Stage::Assemble))?;
        let error_summary = results.summary(self.config.histogram_bins);

        // Non-empty: the splitter guarantees both partitions have rows
        let summary = RunSummary {
            site_id: series.site_id().to_string(),
            run_timestamp,
            data_records: series.len(),
            data_start: series.start().unwrap_or(boundary.timestamp),
            data_end: series.end().unwrap_or(boundary.timestamp),
            usable_start: table.usable_start().unwrap_or(boundary.timestamp),
            usable_rows: table.len(),
            features_created: table.n_features(),
            train_size: train.len(),
            test_size: test.len(),
            split_boundary: boundary.timestamp,
            test_fraction: self.config.test_fraction,
            params: self.config.forest.clone(),
            metrics: evaluation.metrics,
            error_summary,
            training_time_secs: model.training_time_secs(),
        };

        info!(
            site = %summary.site_id,
            records = summary.data_records,
            usable_start = %summary.usable_start,
            train = summary.train_size,
            test = summary.test_size,
            r2 = summary.metrics.r2,
            "Run finished"
        );

        Ok(PipelineOutput {
            model,
            evaluation,
            results,
            summary,
        })
    }
}
