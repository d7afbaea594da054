use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::storage::ObjectLocation;

use super::{RunMetrics, SkipNotice};

/// Severity classification used for failure callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (run failed).
    Error,
    /// Critical error (storage or other infrastructure failures).
    Critical,
}

/// Context about one pipeline run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Object that triggered the run.
    pub source: ObjectLocation,
}

/// Observer interface for run outcomes.
///
/// Every run ends in exactly one callback: `on_report` (metrics), `on_skip` (duplicate
/// content) or `on_failure` (fatal error, optionally followed by `on_alert`).
pub trait RunObserver: Send + Sync {
    /// Called once per completed run, including schema failures.
    fn on_report(&self, _ctx: &RunContext, _metrics: &RunMetrics) {}

    /// Called when the idempotency gate short-circuits a run.
    fn on_skip(&self, _ctx: &RunContext, _notice: &SkipNotice) {}

    /// Called when a run aborts.
    fn on_failure(&self, _ctx: &RunContext, _severity: IngestionSeverity, _error: &PipelineError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &RunContext, severity: IngestionSeverity, error: &PipelineError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn RunObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn RunObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl RunObserver for CompositeObserver {
    fn on_report(&self, ctx: &RunContext, metrics: &RunMetrics) {
        for o in &self.observers {
            o.on_report(ctx, metrics);
        }
    }

    fn on_skip(&self, ctx: &RunContext, notice: &SkipNotice) {
        for o in &self.observers {
            o.on_skip(ctx, notice);
        }
    }

    fn on_failure(&self, ctx: &RunContext, severity: IngestionSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &RunContext, severity: IngestionSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits run metrics as structured `tracing` events.
///
/// This is the pipeline's default observer.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_report(&self, ctx: &RunContext, metrics: &RunMetrics) {
        info!(
            bucket = %ctx.source.bucket,
            source_key = %metrics.source_key,
            fingerprint = %metrics.fingerprint,
            total_rows = metrics.total_rows,
            valid_rows = metrics.valid_rows,
            invalid_rows = metrics.invalid_rows,
            elapsed_seconds = metrics.elapsed_seconds,
            "run metrics"
        );
    }

    fn on_skip(&self, ctx: &RunContext, notice: &SkipNotice) {
        info!(
            bucket = %ctx.source.bucket,
            source_key = %notice.source_key,
            fingerprint = %notice.fingerprint,
            processed = %notice.processed_location,
            "content already processed, skipping"
        );
    }

    fn on_failure(&self, ctx: &RunContext, severity: IngestionSeverity, error: &PipelineError) {
        error!(source = %ctx.source, ?severity, %error, "run failed");
    }

    fn on_alert(&self, ctx: &RunContext, severity: IngestionSeverity, error: &PipelineError) {
        warn!(source = %ctx.source, ?severity, %error, alert = true, "run failure alert");
    }
}

/// Appends one JSON line per run outcome to a local file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append(&self, record: serde_json::Value) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{record}");
        }
    }
}

impl RunObserver for FileObserver {
    fn on_report(&self, ctx: &RunContext, metrics: &RunMetrics) {
        self.append(json!({
            "ts": unix_ts(),
            "event": "report",
            "bucket": ctx.source.bucket,
            "metrics": metrics,
        }));
    }

    fn on_skip(&self, ctx: &RunContext, notice: &SkipNotice) {
        self.append(json!({
            "ts": unix_ts(),
            "event": "skip",
            "bucket": ctx.source.bucket,
            "source_key": notice.source_key,
            "fingerprint": notice.fingerprint,
            "processed_key": notice.processed_location.key,
        }));
    }

    fn on_failure(&self, ctx: &RunContext, severity: IngestionSeverity, error: &PipelineError) {
        self.append(json!({
            "ts": unix_ts(),
            "event": "failure",
            "severity": severity,
            "source": ctx.source.to_string(),
            "error": error.to_string(),
        }));
    }

    fn on_alert(&self, ctx: &RunContext, severity: IngestionSeverity, error: &PipelineError) {
        self.append(json!({
            "ts": unix_ts(),
            "event": "alert",
            "severity": severity,
            "source": ctx.source.to_string(),
            "error": error.to_string(),
        }));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::{FileObserver, IngestionSeverity, RunContext, RunObserver};
    use crate::error::{PipelineError, StorageError};
    use crate::fingerprint::{FingerprintAlgorithm, fingerprint};
    use crate::pipeline::RunMetrics;
    use crate::storage::ObjectLocation;

    #[test]
    fn file_observer_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let obs = FileObserver::new(&path);
        let source = ObjectLocation::new("landing", "users.csv");
        let ctx = RunContext {
            source: source.clone(),
        };

        obs.on_report(
            &ctx,
            &RunMetrics {
                source_key: "users.csv".to_string(),
                fingerprint: fingerprint(b"x", FingerprintAlgorithm::Md5),
                total_rows: 3,
                valid_rows: 2,
                invalid_rows: 0,
                elapsed_seconds: 0.01,
            },
        );
        obs.on_failure(
            &ctx,
            IngestionSeverity::Error,
            &PipelineError::Transport(StorageError::NotFound { location: source }),
        );

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "report");
        assert_eq!(lines[0]["metrics"]["valid_rows"], 2);
        assert_eq!(lines[1]["event"], "failure");
        assert_eq!(lines[1]["severity"], "error");
    }

    #[test]
    fn severities_are_ordered() {
        assert!(IngestionSeverity::Critical > IngestionSeverity::Error);
        assert!(IngestionSeverity::Error > IngestionSeverity::Warning);
        assert!(IngestionSeverity::Warning > IngestionSeverity::Info);
    }
}
