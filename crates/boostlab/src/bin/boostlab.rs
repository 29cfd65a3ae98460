//! boostlab CLI
//!
//! `train` runs a JSON request against a working directory laid out as
//! `uploads/`, `runs/`, `models/` and `logs/`. `predict` re-applies a finished
//! run's artifacts to a new CSV file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use boostlab::data::{CsvOptions, read_csv};
use boostlab::preprocess::ImputationPolicy;
use boostlab::store::{CsvDirectorySource, FileModelSink, JsonFileStore, JsonLinesProgressLog, TracingProgressSink};
use boostlab::{Collaborators, Parallelism, PipelineSettings, TrainRequest, TrainingOrchestrator, TrainingResult};

#[derive(Parser, Debug)]
#[command(name = "boostlab", version, about = "Train and apply gradient-boosted tree models")]
struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a training request
    Train {
        /// JSON request file
        #[arg(short, long)]
        request: PathBuf,

        /// Working directory
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,

        /// Run id (default: derived from the current time)
        #[arg(long)]
        run_id: Option<String>,

        /// Train CV folds one after another
        #[arg(long)]
        sequential: bool,

        /// Impute numeric columns with the median instead of a sentinel
        #[arg(long)]
        median_imputation: bool,
    },

    /// Predict with a completed run
    Predict {
        /// Run id of a completed run
        #[arg(long)]
        run_id: String,

        /// Working directory
        #[arg(short, long, default_value = ".")]
        workdir: PathBuf,

        /// CSV with the run's feature columns
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV (one `prediction` column)
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer().with_target(false)).init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Command::Train {
            request,
            workdir,
            run_id,
            sequential,
            median_imputation,
        } => train(&request, &workdir, run_id, sequential, median_imputation),
        Command::Predict {
            run_id,
            workdir,
            input,
            output,
        } => predict(&run_id, &workdir, &input, &output),
    }
}

fn train(
    request_path: &Path,
    workdir: &Path,
    run_id: Option<String>,
    sequential: bool,
    median_imputation: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(request_path)
        .with_context(|| format!("Failed to read request {}", request_path.display()))?;
    let request = TrainRequest::from_json_str(&text)?;
    let run_id = run_id.unwrap_or_else(|| chrono::Utc::now().format("run-%Y%m%d-%H%M%S").to_string());

    let settings = PipelineSettings::builder()
        .parallelism(if sequential {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        })
        .imputation(if median_imputation {
            ImputationPolicy::Median
        } else {
            ImputationPolicy::default()
        })
        .build();

    let source = CsvDirectorySource::new(workdir.join("uploads"));
    let store = JsonFileStore::new(workdir.join("runs"));
    let models = FileModelSink::new(workdir.join("models"));
    let progress = (TracingProgressSink, JsonLinesProgressLog::new(workdir.join("logs")));
    let collaborators = Collaborators {
        source: &source,
        status: &store,
        progress: &progress,
        store: &store,
        models: &models,
    };

    tracing::info!(run_id = %run_id, model = %request.model_name, dataset = %request.dataset, "starting run");
    let result = TrainingOrchestrator::new(settings).run(&run_id, &request, &collaborators)?;

    let summary = serde_json::json!({
        "run_id": result.run_id,
        "metric": result.evaluation.metric,
        "test_score": result.test_score(),
        "cv_score": result.cv_score,
        "best_params": result.best_params,
        "n_rounds": result.n_rounds,
        "model_path": result.model_path,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn predict(run_id: &str, workdir: &Path, input: &Path, output: &Path) -> Result<()> {
    let store = JsonFileStore::new(workdir.join("runs"));
    let Some(mut document) = store.load(run_id)? else {
        bail!("No run '{run_id}' under {}", store.dir().display());
    };
    let Some(section) = document.get_mut("result").map(serde_json::Value::take) else {
        bail!("Run '{run_id}' has no result; did it complete?");
    };
    let result: TrainingResult = serde_json::from_value(section).context("Failed to parse stored result")?;

    let dataset = read_csv(input, &CsvOptions::default())
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let predictions = result.predict(&dataset)?;

    let mut writer = csv::Writer::from_path(output).with_context(|| format!("Failed to create {}", output.display()))?;
    writer.write_record(["prediction"])?;
    for p in &predictions {
        writer.write_record([p.to_string()])?;
    }
    writer.flush()?;
    tracing::info!(rows = predictions.len(), output = %output.display(), "predictions written");
    Ok(())
}
