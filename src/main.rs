use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::json;
use tracing::{Level, error, info};

use idempotent_ingest::config::PipelineConfig;
use idempotent_ingest::ingestion::{extract_location, parse_event};
use idempotent_ingest::logging::{LogConfig, LogFormat, init_logging};
use idempotent_ingest::pipeline::{
    CompositeObserver, FileObserver, IngestionPipeline, RunObserver, RunOutcome, TracingObserver,
};
use idempotent_ingest::storage::{FsObjectStore, ObjectLocation, ObjectStore};

/// Ingest uploaded CSV objects idempotently from a directory-backed object store.
#[derive(Debug, Parser)]
#[command(name = "idempotent-ingest", version, about)]
struct Cli {
    /// Object-created event JSON file (`-` for stdin). May be repeated; events run in order.
    #[arg(long = "event", value_name = "FILE", conflicts_with_all = ["bucket", "key"])]
    events: Vec<PathBuf>,

    /// Source bucket, instead of an event file.
    #[arg(long, requires = "key")]
    bucket: Option<String>,

    /// Source object key, instead of an event file.
    #[arg(long, requires = "bucket")]
    key: Option<String>,

    /// Root directory of the object store; buckets are its subdirectories.
    #[arg(long, env = "INGEST_STORE_ROOT", default_value = ".")]
    store_root: PathBuf,

    /// Pipeline configuration JSON. Defaults to the users contract.
    #[arg(long, env = "INGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Also append one JSON line per run to this file.
    #[arg(long, env = "INGEST_METRICS_FILE")]
    metrics_file: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: Level,

    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&LogConfig {
        level: cli.log_level,
        format: cli.log_format,
        filter_directives: None,
    })?;

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    // One store per process, shared by every run below.
    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&cli.store_root));

    let mut observers: Vec<Arc<dyn RunObserver>> = vec![Arc::new(TracingObserver)];
    if let Some(path) = &cli.metrics_file {
        observers.push(Arc::new(FileObserver::new(path)));
    }
    let pipeline = IngestionPipeline::new(store, config)?
        .with_observer(Arc::new(CompositeObserver::new(observers)));

    let sources = resolve_sources(&cli)?;
    let mut failures = 0usize;
    for source in &sources {
        match pipeline.run(source) {
            Ok(outcome) => println!("{}", summarize(source, &outcome)),
            Err(e) => {
                failures += 1;
                error!(%source, error = %e, "run aborted");
            }
        }
    }

    info!(runs = sources.len(), failures, "done");
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn resolve_sources(cli: &Cli) -> Result<Vec<ObjectLocation>> {
    if let (Some(bucket), Some(key)) = (&cli.bucket, &cli.key) {
        return Ok(vec![ObjectLocation::new(bucket, key)]);
    }
    if cli.events.is_empty() {
        bail!("nothing to do: pass --event <FILE> or --bucket/--key");
    }
    cli.events
        .iter()
        .map(|path| {
            let raw = read_event(path)?;
            let event = parse_event(&raw).with_context(|| format!("event {}", path.display()))?;
            Ok(extract_location(&event)?)
        })
        .collect()
}

fn read_event(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut std::io::stdin(), &mut buf).context("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn summarize(source: &ObjectLocation, outcome: &RunOutcome) -> serde_json::Value {
    match outcome {
        RunOutcome::SkippedDuplicate(notice) => json!({
            "source": source.to_string(),
            "outcome": "skipped_duplicate",
            "fingerprint": notice.fingerprint,
            "processed_key": notice.processed_location.key,
        }),
        RunOutcome::SchemaFailed { report, error } => json!({
            "source": source.to_string(),
            "outcome": "schema_failed",
            "missing_columns": error.missing,
            "metrics": report.metrics,
        }),
        RunOutcome::Completed(report) => {
            let written: Vec<&str> = report.written.iter().map(|l| l.key.as_str()).collect();
            json!({
                "source": source.to_string(),
                "outcome": "completed",
                "written": written,
                "metrics": report.metrics,
            })
        }
    }
}
