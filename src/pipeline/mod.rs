//! The ingestion orchestrator.
//!
//! [`IngestionPipeline::run`] takes one object location through
//!
//! ```text
//! Started → Downloaded → HashComputed → ┬→ SkippedDuplicate
//!                                       └→ Parsed → Normalized → Validated ┬→ SchemaFailed
//!                                                                          └→ Deduplicated → Persisted → Reported
//! ```
//!
//! Every stage finishes before the next starts. Output names are derived from the content
//! fingerprint, so two runs over the same bytes (under any key, concurrently or not) write
//! identical objects to identical locations. The existence check on the processed location
//! only saves redundant work; it is not a lock.
//!
//! Only fatal errors (storage, unparseable payload) leave `run` as `Err`. A schema failure
//! is an `Ok(RunOutcome::SchemaFailed { .. })` with the whole normalized file written to
//! the error location.

mod metrics;
mod observability;

use std::sync::Arc;

use tracing::{debug, error, info_span};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult, SchemaError, StorageError};
use crate::fingerprint::{ContentFingerprint, fingerprint};
use crate::ingestion::{ObjectCreatedEvent, extract_location, parse_csv, write_csv};
use crate::processing::{RowRejection, ValidationOutcome, dedupe, normalize, validate};
use crate::storage::{ObjectLocation, ObjectStore};
use crate::types::DataSet;

pub use metrics::{MetricsReporter, RunMetrics};
pub use observability::{
    CompositeObserver, FileObserver, IngestionSeverity, RunContext, RunObserver, TracingObserver,
};

/// States a run passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Started,
    Downloaded,
    HashComputed,
    /// Terminal: the processed artifact for this content already exists.
    SkippedDuplicate,
    Parsed,
    Normalized,
    Validated,
    /// Terminal: required columns missing; whole file sent to the error location.
    SchemaFailed,
    Deduplicated,
    Persisted,
    /// Terminal: metrics built and emitted.
    Reported,
}

impl RunState {
    /// Returns `true` for states that end a run.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::SkippedDuplicate | RunState::SchemaFailed | RunState::Reported
        )
    }
}

/// Result of a run that did the work.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub metrics: RunMetrics,
    /// Every state visited, in order, ending in a terminal state.
    pub states: Vec<RunState>,
    /// Objects written by this run, in write order.
    pub written: Vec<ObjectLocation>,
    /// Why each invalid row was rejected.
    pub rejections: Vec<RowRejection>,
}

/// Emitted instead of metrics when the content was already processed.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipNotice {
    pub source_key: String,
    pub fingerprint: ContentFingerprint,
    /// The existing artifact that short-circuited the run.
    pub processed_location: ObjectLocation,
    pub states: Vec<RunState>,
}

/// Terminal outcome of a run that did not fail fatally.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    SkippedDuplicate(SkipNotice),
    SchemaFailed { report: RunReport, error: SchemaError },
    Completed(RunReport),
}

impl RunOutcome {
    /// Metrics of the run, if it got past the idempotency gate.
    pub fn metrics(&self) -> Option<&RunMetrics> {
        match self {
            RunOutcome::SkippedDuplicate(_) => None,
            RunOutcome::SchemaFailed { report, .. } | RunOutcome::Completed(report) => {
                Some(&report.metrics)
            }
        }
    }

    /// States visited, ending in the terminal state.
    pub fn states(&self) -> &[RunState] {
        match self {
            RunOutcome::SkippedDuplicate(notice) => &notice.states,
            RunOutcome::SchemaFailed { report, .. } | RunOutcome::Completed(report) => {
                &report.states
            }
        }
    }

    /// The terminal state.
    pub fn final_state(&self) -> RunState {
        match self {
            RunOutcome::SkippedDuplicate(_) => RunState::SkippedDuplicate,
            RunOutcome::SchemaFailed { .. } => RunState::SchemaFailed,
            RunOutcome::Completed(_) => RunState::Reported,
        }
    }
}

struct RunTracker {
    states: Vec<RunState>,
}

impl RunTracker {
    fn new() -> Self {
        debug!(state = ?RunState::Started, "run state");
        Self {
            states: vec![RunState::Started],
        }
    }

    fn advance(&mut self, state: RunState) {
        debug!(?state, "run state");
        self.states.push(state);
    }
}

/// Sequences download, fingerprinting, the idempotency gate, the processing stages, and
/// persistence for one object at a time.
///
/// The pipeline holds a shared store handle and immutable configuration; it is `Send +
/// Sync` and independent runs may execute concurrently on the same instance.
pub struct IngestionPipeline {
    store: Arc<dyn ObjectStore>,
    config: PipelineConfig,
    observer: Arc<dyn RunObserver>,
}

impl IngestionPipeline {
    /// Create a pipeline over `store`. Fails if `config` is inconsistent.
    ///
    /// Metrics go to a [`TracingObserver`] until [`Self::with_observer`] replaces it.
    pub fn new(store: Arc<dyn ObjectStore>, config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            observer: Arc::new(TracingObserver),
        })
    }

    /// Replace the run observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run for the object named by a trigger event (first record only).
    pub fn run_event(&self, event: &ObjectCreatedEvent) -> PipelineResult<RunOutcome> {
        let source = extract_location(event).inspect_err(|e| {
            error!(error = %e, "cannot resolve trigger event");
        })?;
        self.run(&source)
    }

    /// Run the pipeline for `source` and report the outcome to the observer.
    pub fn run(&self, source: &ObjectLocation) -> PipelineResult<RunOutcome> {
        let span = info_span!("ingest", bucket = %source.bucket, source_key = %source.key);
        let _enter = span.enter();

        let ctx = RunContext {
            source: source.clone(),
        };
        let result = self.execute(source);

        match &result {
            Ok(RunOutcome::SkippedDuplicate(notice)) => self.observer.on_skip(&ctx, notice),
            Ok(RunOutcome::SchemaFailed { report, .. } | RunOutcome::Completed(report)) => {
                self.observer.on_report(&ctx, &report.metrics)
            }
            Err(e) => {
                let severity = severity_for_error(e);
                self.observer.on_failure(&ctx, severity, e);
                if severity >= self.config.alert_at_or_above {
                    self.observer.on_alert(&ctx, severity, e);
                }
            }
        }

        result
    }

    fn execute(&self, source: &ObjectLocation) -> PipelineResult<RunOutcome> {
        let reporter = MetricsReporter::start();
        let mut tracker = RunTracker::new();

        let payload = self.store.download(source)?;
        tracker.advance(RunState::Downloaded);

        let fp = fingerprint(&payload, self.config.fingerprint_algorithm);
        tracker.advance(RunState::HashComputed);

        let processed_location = self.config.layout.processed_location(source, &fp);
        let error_location = self.config.layout.error_location(source, &fp);

        if self.store.exists(&processed_location)? {
            tracker.advance(RunState::SkippedDuplicate);
            return Ok(RunOutcome::SkippedDuplicate(SkipNotice {
                source_key: source.key.clone(),
                fingerprint: fp,
                processed_location,
                states: tracker.states,
            }));
        }

        let raw = parse_csv(&payload)?;
        drop(payload);
        let total_rows = raw.row_count();
        tracker.advance(RunState::Parsed);

        let normalized = normalize(&raw, &self.config.schema);
        drop(raw);
        tracker.advance(RunState::Normalized);

        let validation = validate(&normalized, &self.config.schema);
        tracker.advance(RunState::Validated);

        let ValidationOutcome {
            valid,
            invalid,
            rejections,
        } = match validation {
            Ok(outcome) => outcome,
            Err(schema_error) => {
                error!(
                    missing = ?schema_error.missing,
                    error_location = %error_location,
                    "schema validation failed, persisting whole file to error location"
                );
                tracker.advance(RunState::SchemaFailed);
                self.persist(&error_location, &normalized)?;
                let metrics = reporter.finish(&source.key, &fp, total_rows, 0, 0);
                return Ok(RunOutcome::SchemaFailed {
                    report: RunReport {
                        metrics,
                        states: tracker.states,
                        written: vec![error_location],
                        rejections: Vec::new(),
                    },
                    error: schema_error,
                });
            }
        };
        drop(normalized);

        for r in &rejections {
            debug!(row = r.row, column = %r.column, reason = %r.reason, "row rejected");
        }

        // Validation guarantees the key column exists; config guarantees it is required.
        let unique = dedupe(&valid, &self.config.key_column).map_err(|e| PipelineError::Config {
            message: e.to_string(),
        })?;
        debug!(
            duplicates = valid.row_count() - unique.row_count(),
            key_column = %self.config.key_column,
            "deduplicated valid rows"
        );
        drop(valid);
        tracker.advance(RunState::Deduplicated);

        // The processed artifact is the idempotency marker, so it is written last: a run
        // that dies between the two uploads is redone in full on the next trigger.
        let mut written = Vec::new();
        if !invalid.is_empty() {
            self.persist(&error_location, &invalid)?;
            written.push(error_location);
        }
        if !unique.is_empty() {
            self.persist(&processed_location, &unique)?;
            written.push(processed_location);
        }
        tracker.advance(RunState::Persisted);

        let metrics = reporter.finish(
            &source.key,
            &fp,
            total_rows,
            unique.row_count(),
            invalid.row_count(),
        );
        tracker.advance(RunState::Reported);

        Ok(RunOutcome::Completed(RunReport {
            metrics,
            states: tracker.states,
            written,
            rejections,
        }))
    }

    fn persist(&self, location: &ObjectLocation, dataset: &DataSet) -> PipelineResult<()> {
        let body = write_csv(dataset)?;
        debug!(%location, rows = dataset.row_count(), bytes = body.len(), "persisting");
        self.store.upload(location, body)?;
        Ok(())
    }
}

/// Severity of a fatal run error.
pub fn severity_for_error(e: &PipelineError) -> IngestionSeverity {
    match e {
        PipelineError::Transport(StorageError::NotFound { .. }) => IngestionSeverity::Error,
        PipelineError::Transport(_) => IngestionSeverity::Critical,
        PipelineError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestionSeverity::Critical,
            _ => IngestionSeverity::Error,
        },
        PipelineError::Parse { .. } | PipelineError::Event { .. } | PipelineError::Config { .. } => {
            IngestionSeverity::Error
        }
    }
}
