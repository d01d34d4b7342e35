//! Blob backend adapters
//!
//! Every provider exposes the same blocking capability set. Calls are made
//! from bridge worker threads, never from the controlling context, so the
//! trait is deliberately synchronous.

mod local;
mod memory;
mod remote;

pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use remote::RemoteBackend;

use crate::error::{PoolError, Result};
use crate::infrastructure::config::{validate_namespace_key, BackendConnection, Provider};
use crate::storage::StorageKey;
use bytes::Bytes;
use std::fmt::Debug;
use std::io::Read;
use std::sync::Arc;
use tracing::info;

/// Uniform storage capability set
///
/// Implementations must be safe to call concurrently from many threads and
/// must never leave a partial object behind when `put` fails.
pub trait BlobBackend: Debug + Send + Sync {
    /// Which provider this adapter talks to (diagnostics only)
    fn provider(&self) -> Provider;

    /// Store everything `content` yields under `key`, replacing any previous
    /// object. Returns the number of bytes written.
    fn put(&self, key: &StorageKey, content: &mut dyn Read) -> Result<u64>;

    /// Fetch an object; `PoolError::NotFound` when absent
    fn get(&self, key: &StorageKey) -> Result<Bytes>;

    /// `Some(size)` with the backend-recorded size when present
    fn exists(&self, key: &StorageKey) -> Result<Option<u64>>;

    /// Remove an object; `PoolError::NotFound` when absent
    fn delete(&self, key: &StorageKey) -> Result<()>;
}

/// Build the adapter selected by the connection profile
///
/// `namespace_key` isolates this pool on a shared backend: a subdirectory of
/// the local root, or the bucket name on the remote store.
pub fn build_backend(
    connection: &BackendConnection,
    namespace_key: &str,
) -> Result<Arc<dyn BlobBackend>> {
    connection.validate_profile()?;
    validate_namespace_key(namespace_key).map_err(|e| PoolError::configuration(e.to_string()))?;

    let backend: Arc<dyn BlobBackend> = match connection.provider {
        Provider::Local => {
            // validate_profile guarantees a root for the local provider
            let root = connection.root.clone().unwrap_or_default();
            Arc::new(LocalBackend::new(root.join(namespace_key))?)
        }
        Provider::Remote => Arc::new(RemoteBackend::new(connection, namespace_key)?),
        Provider::Memory => Arc::new(MemoryBackend::new()),
    };

    info!(
        provider = %connection.provider,
        namespace_key = %namespace_key,
        "Initialized blob backend"
    );
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::Credentials;
    use tempfile::TempDir;

    #[test]
    fn test_build_local_backend_under_namespace() {
        let temp_dir = TempDir::new().unwrap();
        let connection = BackendConnection::local(temp_dir.path());

        let backend = build_backend(&connection, "cc-resources").unwrap();
        assert_eq!(backend.provider(), Provider::Local);
        assert!(temp_dir.path().join("cc-resources").is_dir());
    }

    #[test]
    fn test_namespace_cannot_leave_local_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("store");
        let outside = temp_dir.path().join("outside");
        let connection = BackendConnection::local(&root);

        for namespace_key in [outside.to_str().unwrap(), "../outside", ".."] {
            assert!(matches!(
                build_backend(&connection, namespace_key),
                Err(PoolError::Configuration(_))
            ));
        }
        assert!(!outside.exists());
    }

    #[test]
    fn test_build_memory_backend() {
        let backend = build_backend(&BackendConnection::memory(), "ns").unwrap();
        assert_eq!(backend.provider(), Provider::Memory);
    }

    #[test]
    fn test_build_remote_backend_requires_credentials() {
        let mut connection = BackendConnection::remote(
            "http://127.0.0.1:9000",
            Credentials {
                access_key_id: "id".to_string(),
                secret_access_key: "secret".to_string(),
            },
        );
        assert_eq!(
            build_backend(&connection, "ns").unwrap().provider(),
            Provider::Remote
        );

        connection.credentials = None;
        assert!(matches!(
            build_backend(&connection, "ns"),
            Err(PoolError::Configuration(_))
        ));
    }
}
