//! Local filesystem backend
//!
//! ```text
//! <root>/<namespace_key>/
//!   a9/
//!     99/
//!       a9993e364706816aba3e25717850c26c9cd0d89d
//! ```
//!
//! Writes go to a temporary file in the target directory and are renamed
//! into place, so readers never observe a partial object and concurrent
//! writers of the same key simply replace each other's identical bytes.

use super::BlobBackend;
use crate::error::{PoolError, Result};
use crate::infrastructure::config::Provider;
use crate::storage::StorageKey;
use bytes::Bytes;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create the backend, creating `root` if needed
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).map_err(|e| {
            PoolError::configuration(format!(
                "cannot create backend root {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of an entry
    pub fn object_path(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.relative_path())
    }
}

fn unavailable(context: &str, key: &StorageKey, e: io::Error) -> PoolError {
    PoolError::backend_unavailable(format!("{}: {}", context, e), Some(key.to_string()))
}

impl BlobBackend for LocalBackend {
    fn provider(&self) -> Provider {
        Provider::Local
    }

    fn put(&self, key: &StorageKey, content: &mut dyn Read) -> Result<u64> {
        let object_path = self.object_path(key);
        let parent = object_path
            .parent()
            .ok_or_else(|| PoolError::Internal(format!("object path has no parent: {}", key)))?;

        // Create shard directories (e.g., a9/99/)
        fs::create_dir_all(parent)
            .map_err(|e| unavailable("failed to create object directory", key, e))?;

        // Dropping the temp file on any error below removes it
        let mut staged = NamedTempFile::new_in(parent)
            .map_err(|e| unavailable("failed to create staging file", key, e))?;

        let written = io::copy(content, &mut staged).map_err(PoolError::Io)?;
        staged
            .flush()
            .map_err(|e| unavailable("failed to flush staging file", key, e))?;

        staged
            .persist(&object_path)
            .map_err(|e| unavailable("failed to move object into place", key, e.error))?;

        debug!(key = %key, bytes = written, path = %object_path.display(), "Wrote object");
        Ok(written)
    }

    fn get(&self, key: &StorageKey) -> Result<Bytes> {
        match fs::read(self.object_path(key)) {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(PoolError::not_found(key.to_string()))
            }
            Err(e) => Err(unavailable("failed to read object", key, e)),
        }
    }

    fn exists(&self, key: &StorageKey) -> Result<Option<u64>> {
        match fs::metadata(self.object_path(key)) {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable("failed to stat object", key, e)),
        }
    }

    fn delete(&self, key: &StorageKey) -> Result<()> {
        match fs::remove_file(self.object_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(PoolError::not_found(key.to_string()))
            }
            Err(e) => Err(unavailable("failed to delete object", key, e)),
        }
    }
}
