use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::StorageError;

use super::{ObjectLocation, ObjectStore};

/// In-memory [`ObjectStore`].
///
/// Also counts uploads and existence checks so callers can assert how much work a run did.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<ObjectLocation, Vec<u8>>>,
    denied_buckets: Mutex<BTreeSet<String>>,
    failing_exists: Mutex<BTreeSet<ObjectLocation>>,
    uploads: AtomicUsize,
    exists_checks: AtomicUsize,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as an upload.
    pub fn insert(&self, location: ObjectLocation, body: impl Into<Vec<u8>>) {
        self.lock_objects().insert(location, body.into());
    }

    /// Every request against `bucket` fails with [`StorageError::AccessDenied`] from now on.
    pub fn deny_bucket(&self, bucket: impl Into<String>) {
        self.denied_buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(bucket.into());
    }

    /// Existence checks for `location` fail with [`StorageError::Io`] from now on.
    pub fn fail_exists_for(&self, location: ObjectLocation) {
        self.failing_exists
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(location);
    }

    /// Copy of an object's bytes, if present.
    pub fn get(&self, location: &ObjectLocation) -> Option<Vec<u8>> {
        self.lock_objects().get(location).cloned()
    }

    /// All stored locations, sorted.
    pub fn locations(&self) -> Vec<ObjectLocation> {
        self.lock_objects().keys().cloned().collect()
    }

    /// Number of successful uploads so far.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Number of existence checks so far.
    pub fn exists_count(&self) -> usize {
        self.exists_checks.load(Ordering::SeqCst)
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<ObjectLocation, Vec<u8>>> {
        // A poisoned map is still a consistent map: every mutation is a single insert.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_access(&self, location: &ObjectLocation) -> Result<(), StorageError> {
        let denied = self
            .denied_buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&location.bucket);
        if denied {
            return Err(StorageError::AccessDenied {
                location: location.clone(),
            });
        }
        Ok(())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn download(&self, location: &ObjectLocation) -> Result<Vec<u8>, StorageError> {
        self.check_access(location)?;
        self.get(location).ok_or_else(|| StorageError::NotFound {
            location: location.clone(),
        })
    }

    fn upload(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<(), StorageError> {
        self.check_access(location)?;
        self.lock_objects().insert(location.clone(), body);
        let _ = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exists(&self, location: &ObjectLocation) -> Result<bool, StorageError> {
        let _ = self.exists_checks.fetch_add(1, Ordering::SeqCst);
        self.check_access(location)?;
        let failing = self
            .failing_exists
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(location);
        if failing {
            return Err(StorageError::Io {
                location: location.clone(),
                source: io::Error::other("injected metadata failure"),
            });
        }
        Ok(self.lock_objects().contains_key(location))
    }
}
