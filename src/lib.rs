//! `idempotent-ingest` processes one uploaded CSV object per trigger and persists the result
//! exactly once per unique file content.
//!
//! A run downloads the object, fingerprints its bytes, and stops early if the processed
//! artifact for that fingerprint already exists. Otherwise it parses, normalizes, validates
//! and deduplicates the rows, then writes
//!
//! - valid rows to `processed/users_cleaned_{fingerprint}.csv`
//! - invalid rows (or the whole file, if required columns are missing) to
//!   `error/invalid_rows_{fingerprint}.csv`
//!
//! in the source bucket, and emits one metrics record.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use idempotent_ingest::config::PipelineConfig;
//! use idempotent_ingest::pipeline::{IngestionPipeline, RunOutcome};
//! use idempotent_ingest::storage::{MemoryObjectStore, ObjectLocation};
//!
//! # fn main() -> Result<(), idempotent_ingest::PipelineError> {
//! let store = Arc::new(MemoryObjectStore::new());
//! let source = ObjectLocation::new("landing", "incoming/users.csv");
//! store.insert(source.clone(), "user_id,email,age\n7,a@x.io,30\n7,b@x.io,31\n8,c@x.io,40\n");
//!
//! let pipeline = IngestionPipeline::new(store.clone(), PipelineConfig::default())?;
//!
//! let first = pipeline.run(&source)?;
//! let metrics = first.metrics().unwrap();
//! assert_eq!((metrics.total_rows, metrics.valid_rows, metrics.invalid_rows), (3, 2, 0));
//!
//! // Same bytes again: the gate finds the processed artifact and skips.
//! assert!(matches!(pipeline.run(&source)?, RunOutcome::SkippedDuplicate(_)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`]: the orchestrator, run outcomes, metrics and observers
//! - [`processing`]: normalize / validate / dedupe stages
//! - [`ingestion`]: CSV parsing and serialization, trigger events
//! - [`storage`]: object store trait plus in-memory and filesystem backends
//! - [`fingerprint`]: content digests
//! - [`config`]: expected schema, key column, output layout
//! - [`types`]: dataset model
//! - [`logging`]: subscriber setup for binaries
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod ingestion;
pub mod logging;
pub mod pipeline;
pub mod processing;
pub mod storage;
pub mod types;

pub use error::{PipelineError, PipelineResult, SchemaError, StorageError};
