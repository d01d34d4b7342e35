//! 资源池指标收集模块

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// 计数器指标
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    value: AtomicU64,
}

impl Counter {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            value: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn increment(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Pool-wide counters, shared by every worker thread
#[derive(Debug)]
pub struct PoolMetrics {
    matched: Counter,
    unmatched: Counter,
    rejected: Counter,
    size_mismatches: Counter,
    stored_objects: Counter,
    stored_bytes: Counter,
    backend_failures: Counter,
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub matched: u64,
    pub unmatched: u64,
    pub rejected: u64,
    pub size_mismatches: u64,
    pub stored_objects: u64,
    pub stored_bytes: u64,
    pub backend_failures: u64,
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolMetrics {
    pub const fn new() -> Self {
        Self {
            matched: Counter::new("resource_pool_matched_total"),
            unmatched: Counter::new("resource_pool_unmatched_total"),
            rejected: Counter::new("resource_pool_rejected_total"),
            size_mismatches: Counter::new("resource_pool_size_mismatches_total"),
            stored_objects: Counter::new("resource_pool_stored_objects_total"),
            stored_bytes: Counter::new("resource_pool_stored_bytes_total"),
            backend_failures: Counter::new("resource_pool_backend_failures_total"),
        }
    }

    pub fn record_matched(&self) {
        self.matched.increment(1);
    }

    pub fn record_unmatched(&self) {
        self.unmatched.increment(1);
    }

    pub fn record_rejected(&self) {
        self.rejected.increment(1);
    }

    /// A size mismatch also counts as unmatched
    pub fn record_size_mismatch(&self) {
        self.size_mismatches.increment(1);
        self.unmatched.increment(1);
    }

    pub fn record_stored(&self, bytes: u64) {
        self.stored_objects.increment(1);
        self.stored_bytes.increment(bytes);
    }

    pub fn record_backend_failure(&self) {
        self.backend_failures.increment(1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            matched: self.matched.get(),
            unmatched: self.unmatched.get(),
            rejected: self.rejected.get(),
            size_mismatches: self.size_mismatches.get(),
            stored_objects: self.stored_objects.get(),
            stored_bytes: self.stored_bytes.get(),
            backend_failures: self.backend_failures.get(),
        }
    }

    /// 导出为 `name value` 文本格式
    pub fn export(&self) -> String {
        self.counters()
            .iter()
            .map(|counter| format!("{} {}\n", counter.name(), counter.get()))
            .collect()
    }

    pub fn reset(&self) {
        for counter in self.counters() {
            counter.reset();
        }
    }

    fn counters(&self) -> [&Counter; 7] {
        [
            &self.matched,
            &self.unmatched,
            &self.rejected,
            &self.size_mismatches,
            &self.stored_objects,
            &self.stored_bytes,
            &self.backend_failures,
        ]
    }
}
