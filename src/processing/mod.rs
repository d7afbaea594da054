//! In-memory dataset stages.
//!
//! Each stage borrows its input [`crate::types::DataSet`] and returns a new one:
//!
//! - [`normalize()`]: header/cell cleanup and type coercion (total, idempotent)
//! - [`validate()`]: required-column check, then per-row partitioning into valid/invalid
//! - [`dedupe()`]: first-occurrence-wins deduplication by primary key
//!
//! ## Example: normalize → validate → dedupe
//!
//! ```rust
//! use idempotent_ingest::config::PipelineConfig;
//! use idempotent_ingest::ingestion::parse_csv;
//! use idempotent_ingest::processing::{dedupe, normalize, validate};
//!
//! let config = PipelineConfig::default();
//! let raw = parse_csv(b"User_ID,Email,Age\n7,a@x.io,30\n7,b@x.io,31\n8,,40\n").unwrap();
//!
//! let clean = normalize(&raw, &config.schema);
//! let outcome = validate(&clean, &config.schema).unwrap();
//! assert_eq!(outcome.invalid.row_count(), 1);
//!
//! let unique = dedupe(&outcome.valid, &config.key_column).unwrap();
//! assert_eq!(unique.row_count(), 1);
//! ```

pub mod dedupe;
pub mod normalize;
pub mod validate;

pub use dedupe::dedupe;
pub use normalize::{canonical_column_name, normalize};
pub use validate::{RejectReason, RowRejection, ValidationOutcome, validate};
