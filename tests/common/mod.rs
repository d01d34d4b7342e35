//! Resource pool test helpers
//!
//! Shared by the integration tests: payload builders, in-memory pools and a
//! backend wrapper that records which threads call it and how many calls
//! overlap.

#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use resource_pool::infrastructure::config::{PoolConfiguration, Provider};
use resource_pool::storage::{BlobBackend, MemoryBackend, StorageKey};
use resource_pool::{PoolController, ResourcePool};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Deterministic payload of `len` bytes; different seeds give different content
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Blocking pool over a fresh in-memory backend
pub fn memory_pool(maximum_size: u64) -> (ResourcePool, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let pool = ResourcePool::with_backend(
        &PoolConfiguration::for_tests(maximum_size),
        backend.clone(),
    );
    (pool, backend)
}

/// Memory backend that records its callers
#[derive(Debug, Default)]
pub struct RecordingBackend {
    inner: MemoryBackend,
    callers: Mutex<Vec<ThreadId>>,
    thread_names: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl RecordingBackend {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    pub fn callers(&self) -> Vec<ThreadId> {
        self.callers.lock().clone()
    }

    pub fn thread_names(&self) -> Vec<String> {
        self.thread_names.lock().clone()
    }

    /// Most calls ever in progress at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn record<T>(&self, call: impl FnOnce(&MemoryBackend) -> T) -> T {
        let current = thread::current();
        self.callers.lock().push(current.id());
        self.thread_names
            .lock()
            .push(current.name().unwrap_or("<unnamed>").to_string());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let result = call(&self.inner);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl BlobBackend for RecordingBackend {
    fn provider(&self) -> Provider {
        Provider::Memory
    }

    fn put(&self, key: &StorageKey, content: &mut dyn Read) -> resource_pool::Result<u64> {
        self.record(|inner| inner.put(key, content))
    }

    fn get(&self, key: &StorageKey) -> resource_pool::Result<Bytes> {
        self.record(|inner| inner.get(key))
    }

    fn exists(&self, key: &StorageKey) -> resource_pool::Result<Option<u64>> {
        self.record(|inner| inner.exists(key))
    }

    fn delete(&self, key: &StorageKey) -> resource_pool::Result<()> {
        self.record(|inner| inner.delete(key))
    }
}

/// Controller over a recording backend; must run inside a tokio runtime
pub fn recording_controller(
    maximum_size: u64,
    worker_threads: usize,
    delay: Duration,
) -> (PoolController, Arc<RecordingBackend>) {
    let backend = Arc::new(RecordingBackend::with_delay(delay));
    let pool = ResourcePool::with_backend(
        &PoolConfiguration::for_tests(maximum_size),
        backend.clone(),
    );
    let controller = PoolController::with_pool(pool, worker_threads).unwrap();
    (controller, backend)
}
