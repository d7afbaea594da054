//! Object storage collaborator.
//!
//! The pipeline only needs three primitives: [`ObjectStore::download`],
//! [`ObjectStore::upload`] (overwrite, no conditional writes) and [`ObjectStore::exists`]
//! (metadata only). Two backends ship with the crate:
//!
//! - [`MemoryObjectStore`]: process-local map, used by tests and embedding callers
//! - [`FsObjectStore`]: a directory tree laid out as `<root>/<bucket>/<key>`
//!
//! A store is meant to be built once per process and shared behind an `Arc`; it carries
//! no per-run state.

mod fs;
mod memory;

use std::fmt;

use crate::error::StorageError;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

/// A `(bucket, key)` pair naming one object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectLocation {
    /// Bucket (container) name.
    pub bucket: String,
    /// Object key inside the bucket.
    pub key: String,
}

impl ObjectLocation {
    /// Create a new location.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// A sibling object in the same bucket.
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self {
            bucket: self.bucket.clone(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Minimal object storage interface consumed by the pipeline.
pub trait ObjectStore: Send + Sync {
    /// Read the whole object into memory.
    ///
    /// Fails with [`StorageError::NotFound`] or [`StorageError::AccessDenied`].
    fn download(&self, location: &ObjectLocation) -> Result<Vec<u8>, StorageError>;

    /// Write `body` to `location`, replacing any existing object.
    fn upload(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<(), StorageError>;

    /// Metadata-only existence check.
    ///
    /// Returns `Ok(false)` on not-found; every other failure propagates.
    fn exists(&self, location: &ObjectLocation) -> Result<bool, StorageError>;
}
