use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::StorageError;

use super::{ObjectLocation, ObjectStore};

/// [`ObjectStore`] backed by a local directory laid out as `<root>/<bucket>/<key>`.
///
/// Uploads go through a temporary sibling file and a rename, so a concurrent reader sees
/// either the old object or the complete new one.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    tmp_seq: AtomicU64,
}

impl FsObjectStore {
    /// Create a store rooted at `root`. The directory is created lazily on first upload.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            tmp_seq: AtomicU64::new(0),
        }
    }

    /// Resolve a location to a path, refusing anything that would escape its bucket.
    pub fn path_of(&self, location: &ObjectLocation) -> Result<PathBuf, StorageError> {
        let denied = || StorageError::AccessDenied {
            location: location.clone(),
        };
        if !is_plain_relative(Path::new(&location.bucket), true)
            || !is_plain_relative(Path::new(&location.key), false)
        {
            return Err(denied());
        }
        Ok(self.root.join(&location.bucket).join(&location.key))
    }
}

fn is_plain_relative(path: &Path, single_segment: bool) -> bool {
    let mut segments = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => segments += 1,
            _ => return false,
        }
    }
    segments > 0 && (!single_segment || segments == 1)
}

fn map_io(location: &ObjectLocation, err: io::Error) -> StorageError {
    match err.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound {
            location: location.clone(),
        },
        io::ErrorKind::PermissionDenied => StorageError::AccessDenied {
            location: location.clone(),
        },
        _ => StorageError::Io {
            location: location.clone(),
            source: err,
        },
    }
}

impl ObjectStore for FsObjectStore {
    fn download(&self, location: &ObjectLocation) -> Result<Vec<u8>, StorageError> {
        let path = self.path_of(location)?;
        let body = fs::read(&path).map_err(|e| map_io(location, e))?;
        debug!(%location, bytes = body.len(), "downloaded object");
        Ok(body)
    }

    fn upload(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_of(location)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| map_io(location, e))?;
        }

        let seq = self.tmp_seq.fetch_add(1, Ordering::SeqCst);
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".tmp-{}-{seq}", std::process::id()));
        let tmp = path.with_file_name(tmp_name);

        let len = body.len();
        if let Err(e) = fs::write(&tmp, body).and_then(|()| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(map_io(location, e));
        }
        debug!(%location, bytes = len, "uploaded object");
        Ok(())
    }

    fn exists(&self, location: &ObjectLocation) -> Result<bool, StorageError> {
        let path = self.path_of(location)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io(location, e)),
        }
    }
}
