//! In-memory deterministic backend for tests
//!
//! Reproduces the put/get/exists/delete semantics of the real providers with
//! no disk or network I/O. Outages can be simulated with
//! [`MemoryBackend::set_unavailable`].

use super::BlobBackend;
use crate::error::{PoolError, Result};
use crate::infrastructure::config::Provider;
use crate::storage::StorageKey;
use bytes::Bytes;
use dashmap::DashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: DashMap<StorageKey, Bytes>,
    unavailable: AtomicBool,
    writes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with `BackendUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Completed `put` calls, including overwrites
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of distinct stored objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Place bytes under a key directly, bypassing every pool check
    pub fn insert_raw(&self, key: StorageKey, content: impl Into<Bytes>) {
        self.objects.insert(key, content.into());
    }

    fn check_available(&self, key: &StorageKey) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PoolError::backend_unavailable(
                "simulated outage",
                Some(key.to_string()),
            ));
        }
        Ok(())
    }
}

impl BlobBackend for MemoryBackend {
    fn provider(&self) -> Provider {
        Provider::Memory
    }

    fn put(&self, key: &StorageKey, content: &mut dyn Read) -> Result<u64> {
        self.check_available(key)?;

        // Buffer first so a failed read never creates an entry
        let mut buffer = Vec::new();
        content.read_to_end(&mut buffer)?;

        let written = buffer.len() as u64;
        self.objects.insert(key.clone(), Bytes::from(buffer));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(written)
    }

    fn get(&self, key: &StorageKey) -> Result<Bytes> {
        self.check_available(key)?;
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PoolError::not_found(key.to_string()))
    }

    fn exists(&self, key: &StorageKey) -> Result<Option<u64>> {
        self.check_available(key)?;
        Ok(self.objects.get(key).map(|entry| entry.value().len() as u64))
    }

    fn delete(&self, key: &StorageKey) -> Result<()> {
        self.check_available(key)?;
        self.objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| PoolError::not_found(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Checksum;
    use crate::storage::derive_key;
    use std::io;

    #[test]
    fn test_round_trip_semantics() {
        let backend = MemoryBackend::new();
        let key = derive_key(&Checksum::compute(b"abc"));

        assert_eq!(backend.exists(&key).unwrap(), None);
        assert_eq!(backend.put(&key, &mut &b"abc"[..]).unwrap(), 3);
        assert_eq!(backend.exists(&key).unwrap(), Some(3));
        assert_eq!(backend.get(&key).unwrap(), Bytes::from_static(b"abc"));

        backend.delete(&key).unwrap();
        assert!(backend.get(&key).unwrap_err().is_not_found());
        assert!(backend.delete(&key).unwrap_err().is_not_found());
    }

    #[test]
    fn test_simulated_outage() {
        let backend = MemoryBackend::new();
        let key = derive_key(&Checksum::compute(b"abc"));
        backend.set_unavailable(true);

        let error = backend.exists(&key).unwrap_err();
        assert!(error.is_retryable());
        assert!(backend.put(&key, &mut &b"abc"[..]).is_err());

        backend.set_unavailable(false);
        assert_eq!(backend.exists(&key).unwrap(), None);
    }

    #[test]
    fn test_failed_read_creates_no_entry() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }

        let backend = MemoryBackend::new();
        let key = derive_key(&Checksum::compute(b"abc"));

        assert!(backend.put(&key, &mut Broken).is_err());
        assert!(backend.is_empty());
        assert_eq!(backend.write_count(), 0);
    }
}
