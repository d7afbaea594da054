use std::time::Instant;

use serde::Serialize;

use crate::fingerprint::ContentFingerprint;

/// Summary of one run, emitted once through the observer and never persisted as data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Object key that triggered the run.
    pub source_key: String,
    pub fingerprint: ContentFingerprint,
    /// Rows parsed from the payload, before any filtering.
    pub total_rows: usize,
    /// Rows persisted to the processed artifact (after deduplication).
    pub valid_rows: usize,
    /// Rows persisted to the error artifact. Zero on a whole-file schema failure.
    pub invalid_rows: usize,
    /// Wall time of the run, rounded to two decimals.
    pub elapsed_seconds: f64,
}

/// Assembles [`RunMetrics`] for a single run.
///
/// Started when the run starts; consumed by [`MetricsReporter::finish`], so a run yields at
/// most one metrics record.
#[derive(Debug)]
pub struct MetricsReporter {
    started: Instant,
}

impl MetricsReporter {
    /// Start the run clock.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Stop the clock and build the metrics record.
    pub fn finish(
        self,
        source_key: &str,
        fingerprint: &ContentFingerprint,
        total_rows: usize,
        valid_rows: usize,
        invalid_rows: usize,
    ) -> RunMetrics {
        let elapsed = self.started.elapsed().as_secs_f64();
        RunMetrics {
            source_key: source_key.to_string(),
            fingerprint: fingerprint.clone(),
            total_rows,
            valid_rows,
            invalid_rows,
            elapsed_seconds: (elapsed * 100.0).round() / 100.0,
        }
    }
}
