//! Flowcast CLI Module
//!
//! Command-line interface for training, prediction and data inspection.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::evaluation::{RegressionMetrics, ResultAssembler};
use crate::io::{load_model, write_predictions_csv, ArtifactWriter, CsvSeriesSource, StoredModel};
use crate::pipeline::FlowPipeline;
use crate::series::{find_cadence_break, GapPolicy, LoaderConfig, SeriesLoader, SeriesSource};
use crate::tracking::{record_failure, record_success, ExperimentTracker, DEFAULT_EXPERIMENT};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(230, 110, 100) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn step_failed() {
    println!("{}", bad("failed"));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "flowcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "River discharge forecasting with temporal validation")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train and evaluate a model for one site
    Train(TrainArgs),

    /// Predict a series with a saved model
    Predict {
        /// Saved model file (JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Input CSV with a `time` column and one column per site
        #[arg(short, long)]
        data: PathBuf,

        /// Site identifier (COMID) to read from the CSV
        #[arg(short, long)]
        site: String,

        /// Output predictions file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Describe the series of one site
    Info {
        /// Input CSV with a `time` column and one column per site
        #[arg(short, long)]
        data: PathBuf,

        /// Site identifier (COMID)
        #[arg(short, long)]
        site: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Input CSV with a `time` column and one column per site
    #[arg(short, long)]
    pub data: PathBuf,

    /// Site identifier (COMID)
    #[arg(short, long)]
    pub site: String,

    /// JSON configuration file; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Share of the latest rows held out for testing
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Number of trees
    #[arg(long)]
    pub estimators: Option<usize>,

    /// Maximum tree depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Missing-day handling (reject, interpolate)
    #[arg(long)]
    pub gap_policy: Option<String>,

    /// Directory for predictions, importances, model and metrics
    #[arg(short, long, default_value = "data/processed")]
    pub output_dir: PathBuf,

    /// Record the run in a file-backed experiment tracker under this directory
    #[arg(long)]
    pub track_dir: Option<PathBuf>,
}

impl TrainArgs {
    /// Configuration file (or defaults) with command-line overrides applied
    pub fn resolve_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        config.site_id = self.site.clone();
        if let Some(f) = self.test_fraction {
            config.test_fraction = f;
        }
        if let Some(n) = self.estimators {
            config.forest.n_estimators = n;
        }
        if let Some(d) = self.max_depth {
            config.forest.max_depth = Some(d);
        }
        if let Some(s) = self.seed {
            config.forest.random_state = s;
        }
        if let Some(policy) = &self.gap_policy {
            config.loader.gap_policy = policy.parse::<GapPolicy>()?;
        }
        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let config = args.resolve_config()?;
    let source = CsvSeriesSource::new(&args.data);
    let mut tracker = match &args.track_dir {
        Some(dir) => Some(ExperimentTracker::with_dir(dir, DEFAULT_EXPERIMENT)?),
        None => None,
    };

    step_run(&format!("Running pipeline for site {}", config.site_id.cyan()));
    let start = Instant::now();
    let output = match FlowPipeline::new(config.clone()).run(&source) {
        Ok(output) => output,
        Err(e) => {
            step_failed();
            if let Some(tracker) = tracker.as_mut() {
                let run = record_failure(tracker, &config, &e)?;
                kv("Tracked run", &run.run_id);
            }
            let stage = e.stage().map(|s| s.to_string()).unwrap_or_else(|| "setup".to_string());
            kv("Stage", &stage);
            kv("Kind", &e.kind().to_string());
            println!();
            return Err(e.into());
        }
    };
    step_done(&format!("{:?}", start.elapsed()));

    step_run("Writing artifacts");
    let summary = &output.summary;
    let stored = StoredModel::new(
        config.site_id.clone(),
        config.target_label.clone(),
        config.features.clone(),
        summary.run_timestamp,
        output.model.clone(),
    );
    let writer = ArtifactWriter::new(&args.output_dir, &config.site_id, summary.run_timestamp);
    let paths = writer.write_all(&output, &stored)?;
    step_done(&args.output_dir.display().to_string());

    if let Some(tracker) = tracker.as_mut() {
        let run = record_success(tracker, &config, &output, Some(&paths))?;
        kv("Tracked run", &run.run_id);
    }

    section("Data");
    kv("Records", &summary.data_records.to_string());
    kv("Range", &format!("{} → {}", summary.data_start.date(), summary.data_end.date()));
    kv("Usable from", &summary.usable_start.date().to_string());
    kv("Features", &summary.features_created.to_string());
    kv("Train / test", &format!("{} / {}", summary.train_size, summary.test_size));
    kv("Boundary", &summary.split_boundary.to_string());

    section("Metrics");
    let m = &summary.metrics;
    kv("MAE", &format!("{:.4}", m.mae));
    kv("RMSE", &format!("{:.4}", m.rmse));
    println!("  {:<18} {}", muted("R²"), format!("{:.4}", m.r2).white().bold());
    if let Some(mape) = summary.error_summary.mape {
        kv("MAPE", &format!("{:.2}%", mape));
    }
    if summary.error_summary.undefined_percent_rows > 0 {
        kv("Zero-flow rows", &summary.error_summary.undefined_percent_rows.to_string());
    }

    section("Top features");
    for fi in output.evaluation.importances.iter().take(5) {
        println!("  {:>2}. {:<28} {}", fi.rank, fi.feature, format!("{:.4}", fi.importance).white());
    }

    section("Artifacts");
    for path in paths.iter() {
        println!("  {}", dim(&path.display().to_string()));
    }
    println!();

    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    site: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let stored = load_model(model_path)?;
    step_done(&format!("{} trees, site {}", stored.model.forest().n_trees(), stored.site_id));

    step_run("Building features");
    let loader = SeriesLoader::new(LoaderConfig::default().with_min_usable_rows(1))
        .with_lookback_rows(stored.features.lookback_rows())
        .with_target_label(stored.target_label.clone());
    let series = loader.load(&CsvSeriesSource::new(data_path), site)?;
    let table = stored.feature_builder().build(&series)?;
    step_done(&format!("{} rows", table.len()));

    step_run("Predicting");
    let predictions = stored.model.predict_table(&table)?;
    let results = ResultAssembler::default().assemble(
        site,
        table.timestamps(),
        &table.target().to_vec(),
        &predictions.to_vec(),
    )?;
    let metrics = RegressionMetrics::compute(table.target(), &predictions)?;
    step_done(&format!("{} predictions", results.len()));

    let default_output = PathBuf::from(format!("{}_predictions.csv", site));
    let output = output.unwrap_or(default_output.as_path());
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_predictions_csv(&results, output)?;

    println!();
    kv("MAE", &format!("{:.4}", metrics.mae));
    kv("R²", &format!("{:.4}", metrics.r2));
    kv("Output", &output.display().to_string());
    println!();

    Ok(())
}

pub fn cmd_info(data_path: &Path, site: &str) -> anyhow::Result<()> {
    section("Series Info");

    let source = CsvSeriesSource::new(data_path);
    let columns = source.columns()?;
    let mut observations = source.fetch(site)?;
    observations.sort_by_key(|o| o.timestamp);

    let timestamps: Vec<_> = observations.iter().map(|o| o.timestamp).collect();
    let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let zero_days = values.iter().filter(|v| **v == 0.0).count();

    kv("File", &data_path.display().to_string());
    kv("Columns", &columns.join(", "));
    kv("Site", site);
    kv("Observations", &observations.len().to_string());
    if let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) {
        kv("Range", &format!("{} → {}", first, last));
    }
    kv("Flow min/mean/max", &format!("{:.3} / {:.3} / {:.3}", min, mean, max));
    kv("Zero-flow days", &zero_days.to_string());
    match find_cadence_break(&timestamps) {
        Some(gap) => kv("Cadence", &format!("{} ({})", "irregular".yellow(), gap)),
        None => kv("Cadence", "daily, no gaps"),
    }

    let required = PipelineConfig::default().features.lookback_rows() + LoaderConfig::default().min_usable_rows;
    if observations.len() < required {
        println!(
            "  {}",
            format!("needs at least {} observations to train with defaults", required).yellow()
        );
    }
    println!();
    Ok(())
}
