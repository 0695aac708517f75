//! Flowcast - River discharge forecasting
//!
//! This crate turns a single daily discharge series into a supervised
//! regression problem and scores a random forest on it without lookahead:
//! - Series loading with explicit ordering, deduplication and gap policy
//! - Calendar, cyclic, lag and rolling-statistic features
//! - Chronological train/test split at a timestamp quantile
//! - Parallel, seeded random forest regression
//! - Error metrics, importance ranking and row-level results
//!
//! # Modules
//!
//! ## Core
//! - [`series`] - Raw observation sources and the series loader
//! - [`timeseries`] - Feature engineering and temporal splitting
//! - [`training`] - Decision trees, random forest and trainer
//! - [`evaluation`] - Metrics, importance ranking and result assembly
//! - [`pipeline`] - The stages wired end to end
//!
//! ## Infrastructure
//! - [`config`] - Run configuration
//! - [`io`] - CSV input, artifact output and model persistence
//! - [`tracking`] - File-backed experiment tracking
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core forecasting modules
pub mod series;
pub mod timeseries;
pub mod training;
pub mod evaluation;
pub mod pipeline;

// Infrastructure
pub mod config;
pub mod io;
pub mod tracking;

// Services
pub mod cli;

pub use error::{FlowcastError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ErrorKind, FlowcastError, Result, Stage};

    // Loading
    pub use crate::series::{FlowSeries, GapPolicy, InMemorySource, LoaderConfig, RawObservation, SeriesLoader, SeriesSource};

    // Features and split
    pub use crate::timeseries::{FeatureBuilder, FeatureConfig, FeatureTable, TemporalSplit, TemporalSplitter};

    // Training
    pub use crate::training::{ForestParams, MaxFeatures, TrainedModel, Trainer};

    // Evaluation
    pub use crate::evaluation::{EvaluationResult, Evaluator, RegressionMetrics, ResultAssembler, ResultTable};

    // Pipeline
    pub use crate::config::PipelineConfig;
    pub use crate::pipeline::{FlowPipeline, PipelineOutput, RunSummary};

    // Adapters
    pub use crate::io::{ArtifactWriter, CsvSeriesSource, StoredModel};
}
