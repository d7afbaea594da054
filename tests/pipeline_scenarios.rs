use std::sync::{Arc, Mutex};

use idempotent_ingest::config::PipelineConfig;
use idempotent_ingest::error::{PipelineError, StorageError};
use idempotent_ingest::fingerprint::{FingerprintAlgorithm, fingerprint};
use idempotent_ingest::pipeline::{
    IngestionPipeline, IngestionSeverity, RunContext, RunMetrics, RunObserver, RunOutcome,
    SkipNotice,
};
use idempotent_ingest::storage::{MemoryObjectStore, ObjectLocation};

#[derive(Default)]
struct RecordingObserver {
    reports: Mutex<Vec<RunMetrics>>,
    skips: Mutex<Vec<String>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
}

impl RunObserver for RecordingObserver {
    fn on_report(&self, _ctx: &RunContext, metrics: &RunMetrics) {
        self.reports.lock().unwrap().push(metrics.clone());
    }

    fn on_skip(&self, _ctx: &RunContext, notice: &SkipNotice) {
        self.skips.lock().unwrap().push(notice.source_key.clone());
    }

    fn on_failure(&self, _ctx: &RunContext, severity: IngestionSeverity, _error: &PipelineError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &RunContext, severity: IngestionSeverity, _error: &PipelineError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

struct Harness {
    store: Arc<MemoryObjectStore>,
    observer: Arc<RecordingObserver>,
    pipeline: IngestionPipeline,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryObjectStore::new());
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = IngestionPipeline::new(store.clone(), PipelineConfig::default())
        .unwrap()
        .with_observer(observer.clone());
    Harness {
        store,
        observer,
        pipeline,
    }
}

fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(format!("tests/fixtures/{name}")).unwrap()
}

fn processed(fp_of: &[u8]) -> ObjectLocation {
    let fp = fingerprint(fp_of, FingerprintAlgorithm::Md5);
    ObjectLocation::new("landing", format!("processed/users_cleaned_{fp}.csv"))
}

fn errors(fp_of: &[u8]) -> ObjectLocation {
    let fp = fingerprint(fp_of, FingerprintAlgorithm::Md5);
    ObjectLocation::new("landing", format!("error/invalid_rows_{fp}.csv"))
}

fn text(bytes: Option<Vec<u8>>) -> String {
    String::from_utf8(bytes.expect("object should exist")).unwrap()
}

#[test]
fn duplicate_user_ids_keep_first_row() {
    let h = harness();
    let body = fixture("users_duplicates.csv");
    let source = ObjectLocation::new("landing", "incoming/users.csv");
    h.store.insert(source.clone(), body.clone());

    let outcome = h.pipeline.run(&source).unwrap();

    let metrics = outcome.metrics().unwrap();
    assert_eq!(metrics.total_rows, 3);
    assert_eq!(metrics.valid_rows, 2);
    assert_eq!(metrics.invalid_rows, 0);
    assert_eq!(
        text(h.store.get(&processed(&body))),
        "user_id,email,age\n7,ada@example.com,36\n8,grace@example.com,45\n"
    );
    assert!(h.store.get(&errors(&body)).is_none());
    assert_eq!(h.observer.reports.lock().unwrap().len(), 1);
}

#[test]
fn missing_user_id_column_sends_whole_file_to_error() {
    let h = harness();
    let body = fixture("users_missing_user_id.csv");
    let source = ObjectLocation::new("landing", "incoming/no_ids.csv");
    h.store.insert(source.clone(), body.clone());

    let outcome = h.pipeline.run(&source).unwrap();

    let RunOutcome::SchemaFailed { report, error } = outcome else {
        panic!("expected schema failure");
    };
    assert_eq!(error.missing, vec!["user_id".to_string()]);
    assert_eq!(report.metrics.total_rows, 2);
    assert_eq!(report.metrics.valid_rows, 0);
    assert_eq!(report.metrics.invalid_rows, 0);
    // Normalized, not partitioned: every row is there.
    assert_eq!(
        text(h.store.get(&errors(&body))),
        "email,age\nada@example.com,36\ngrace@example.com,45\n"
    );
    assert!(h.store.get(&processed(&body)).is_none());
    assert_eq!(h.observer.reports.lock().unwrap().len(), 1);
}

#[test]
fn row_missing_email_is_routed_to_error_artifact() {
    let h = harness();
    let body = fixture("users_missing_email.csv");
    let source = ObjectLocation::new("landing", "incoming/partial.csv");
    h.store.insert(source.clone(), body.clone());

    let RunOutcome::Completed(report) = h.pipeline.run(&source).unwrap() else {
        panic!("expected completed run");
    };

    let m = &report.metrics;
    assert_eq!(m.valid_rows + m.invalid_rows, m.total_rows);
    assert_eq!((m.valid_rows, m.invalid_rows), (2, 1));
    assert_eq!(report.rejections.len(), 1);
    assert_eq!(report.rejections[0].column, "email");
    assert_eq!(text(h.store.get(&errors(&body))), "user_id,email,age\n2,,45\n");
    assert_eq!(
        text(h.store.get(&processed(&body))),
        "user_id,email,age\n1,ada@example.com,36\n3,linus@example.com,54\n"
    );
    // Error artifact first, idempotency marker last.
    assert_eq!(report.written, vec![errors(&body), processed(&body)]);
}

#[test]
fn same_content_under_another_key_is_skipped() {
    let h = harness();
    let body = fixture("users_duplicates.csv");
    let first = ObjectLocation::new("landing", "incoming/monday.csv");
    let second = ObjectLocation::new("landing", "incoming/tuesday_copy.csv");
    h.store.insert(first.clone(), body.clone());
    h.store.insert(second.clone(), body.clone());

    let a = h.pipeline.run(&first).unwrap();
    let uploads_after_first = h.store.upload_count();
    let checks_after_first = h.store.exists_count();
    let b = h.pipeline.run(&second).unwrap();

    assert!(matches!(a, RunOutcome::Completed(_)));
    let RunOutcome::SkippedDuplicate(notice) = b else {
        panic!("expected the second run to skip");
    };
    assert_eq!(notice.processed_location, processed(&body));
    assert_eq!(notice.source_key, "incoming/tuesday_copy.csv");
    assert_eq!(h.store.upload_count(), uploads_after_first);
    // The skip costs one metadata call and nothing else.
    assert_eq!(h.store.exists_count(), checks_after_first + 1);
    assert_eq!(*h.observer.skips.lock().unwrap(), vec!["incoming/tuesday_copy.csv".to_string()]);
    assert_eq!(h.observer.reports.lock().unwrap().len(), 1);
}

#[test]
fn new_content_under_same_key_does_not_collide() {
    let h = harness();
    let source = ObjectLocation::new("landing", "incoming/users.csv");
    let v1 = b"user_id,email\n1,a@x.io\n".to_vec();
    let v2 = b"user_id,email\n1,a@x.io\n2,b@x.io\n".to_vec();

    h.store.insert(source.clone(), v1.clone());
    assert!(matches!(h.pipeline.run(&source).unwrap(), RunOutcome::Completed(_)));

    h.store.insert(source.clone(), v2.clone());
    let second = h.pipeline.run(&source).unwrap();
    assert_eq!(second.metrics().unwrap().valid_rows, 2);

    assert!(h.store.get(&processed(&v1)).is_some());
    assert!(h.store.get(&processed(&v2)).is_some());
}

#[test]
fn messy_headers_and_cells_are_normalized_before_persisting() {
    let h = harness();
    let body = fixture("users_messy_headers.csv");
    let source = ObjectLocation::new("landing", "incoming/messy.csv");
    h.store.insert(source.clone(), body.clone());

    let outcome = h.pipeline.run(&source).unwrap();

    assert_eq!(outcome.metrics().unwrap().valid_rows, 2);
    assert_eq!(
        text(h.store.get(&processed(&body))),
        "user_id,email,age\n10,alan@example.com,41\n11,barbara@example.com,\n"
    );
}

#[test]
fn missing_source_object_is_fatal_without_output() {
    let h = harness();
    let source = ObjectLocation::new("landing", "incoming/gone.csv");

    let err = h.pipeline.run(&source).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transport(StorageError::NotFound { .. })
    ));
    assert!(h.store.locations().is_empty());
    assert!(h.observer.reports.lock().unwrap().is_empty());
    assert_eq!(*h.observer.failures.lock().unwrap(), vec![IngestionSeverity::Error]);
    assert!(h.observer.alerts.lock().unwrap().is_empty());
}

#[test]
fn access_denied_is_critical_and_alerts() {
    let h = harness();
    let source = ObjectLocation::new("locked", "users.csv");
    h.store.insert(source.clone(), fixture("users_duplicates.csv"));
    h.store.deny_bucket("locked");

    let err = h.pipeline.run(&source).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transport(StorageError::AccessDenied { .. })
    ));
    assert_eq!(*h.observer.failures.lock().unwrap(), vec![IngestionSeverity::Critical]);
    assert_eq!(*h.observer.alerts.lock().unwrap(), vec![IngestionSeverity::Critical]);
}

#[test]
fn failed_existence_check_aborts_without_output_or_metrics() {
    let h = harness();
    let body = fixture("users_duplicates.csv");
    let source = ObjectLocation::new("landing", "incoming/users.csv");
    h.store.insert(source.clone(), body.clone());
    h.store.fail_exists_for(processed(&body));

    let err = h.pipeline.run(&source).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transport(StorageError::Io { .. })
    ));
    assert_eq!(h.store.exists_count(), 1);
    assert_eq!(h.store.upload_count(), 0);
    assert_eq!(h.store.locations(), vec![source]);
    assert!(h.observer.reports.lock().unwrap().is_empty());
    assert!(h.observer.skips.lock().unwrap().is_empty());
    assert_eq!(*h.observer.failures.lock().unwrap(), vec![IngestionSeverity::Critical]);
}

#[test]
fn ragged_csv_aborts_before_any_write() {
    let h = harness();
    let source = ObjectLocation::new("landing", "incoming/ragged.csv");
    h.store.insert(source.clone(), "user_id,email\n1,a@x.io,extra\n");

    let err = h.pipeline.run(&source).unwrap_err();

    assert!(matches!(err, PipelineError::Parse { line: 2, .. }));
    assert_eq!(h.store.upload_count(), 0);
}

#[test]
fn concurrent_runs_over_same_content_converge_on_one_artifact() {
    let h = harness();
    let body = fixture("users_missing_email.csv");
    let sources: Vec<ObjectLocation> = (0..8)
        .map(|i| ObjectLocation::new("landing", format!("incoming/copy_{i}.csv")))
        .collect();
    for s in &sources {
        h.store.insert(s.clone(), body.clone());
    }

    let pipeline = &h.pipeline;
    let outcomes: Vec<RunOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|s| scope.spawn(move || pipeline.run(s).unwrap()))
            .collect();
        handles.into_iter().map(|j| j.join().unwrap()).collect()
    });

    assert!(outcomes.iter().any(|o| matches!(o, RunOutcome::Completed(_))));
    for o in &outcomes {
        assert!(matches!(
            o,
            RunOutcome::Completed(_) | RunOutcome::SkippedDuplicate(_)
        ));
    }

    let outputs: Vec<_> = h
        .store
        .locations()
        .into_iter()
        .filter(|l| !l.key.starts_with("incoming/"))
        .collect();
    assert_eq!(outputs, vec![errors(&body), processed(&body)]);
    assert_eq!(
        text(h.store.get(&processed(&body))),
        "user_id,email,age\n1,ada@example.com,36\n3,linus@example.com,54\n"
    );
}
