//! Object-created trigger events.
//!
//! The envelope follows the S3 notification shape:
//!
//! ```json
//! { "Records": [ { "s3": { "bucket": { "name": "landing" }, "object": { "key": "users.csv" } } } ] }
//! ```
//!
//! Only the first record is honored. Notifications that batch several objects are a known
//! simplification: the extra records are logged and ignored, never processed.

use serde::Deserialize;
use tracing::warn;

use crate::error::{PipelineError, PipelineResult};
use crate::storage::ObjectLocation;

/// Top-level notification envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

/// One notification record.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEntity {
    /// Object key exactly as delivered; no URL decoding is applied.
    pub key: String,
}

/// Deserialize an event envelope from JSON.
pub fn parse_event(raw: &[u8]) -> PipelineResult<ObjectCreatedEvent> {
    serde_json::from_slice(raw).map_err(|e| PipelineError::Event {
        message: e.to_string(),
    })
}

/// Location named by the first record of `event`.
pub fn extract_location(event: &ObjectCreatedEvent) -> PipelineResult<ObjectLocation> {
    let Some(first) = event.records.first() else {
        return Err(PipelineError::Event {
            message: "event has no records".to_string(),
        });
    };

    if event.records.len() > 1 {
        warn!(
            ignored_records = event.records.len() - 1,
            "multi-record event: only the first record is processed"
        );
    }

    let bucket = first.s3.bucket.name.as_str();
    let key = first.s3.object.key.as_str();
    if bucket.is_empty() || key.is_empty() {
        return Err(PipelineError::Event {
            message: format!("record names an empty bucket or key (bucket='{bucket}', key='{key}')"),
        });
    }

    Ok(ObjectLocation::new(bucket, key))
}
