//! Resource pool
//!
//! Content-addressed store of application resources, deduplicated globally by
//! SHA-1. All methods here block on the backend; the controlling context
//! reaches them only through [`crate::bridge::PoolController`].

use super::backend::{build_backend, BlobBackend};
use super::namespace::derive_key;
use super::size_policy::SizePolicy;
use crate::error::{PoolError, Result};
use crate::infrastructure::config::PoolConfiguration;
use crate::models::{dedup_descriptors, Checksum, MatchReport, ResourceDescriptor};
use crate::monitoring::PoolMetrics;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ResourcePool {
    namespace_key: String,
    policy: SizePolicy,
    backend: Arc<dyn BlobBackend>,
    metrics: Arc<PoolMetrics>,
}

/// Outcome of comparing one descriptor with what the backend holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    Matched,
    Unmatched,
    SizeMismatch(u64),
    Rejected,
}

impl ResourcePool {
    /// Build a pool and its backend from configuration
    ///
    /// # Errors
    ///
    /// `PoolError::Configuration` when the configuration is invalid or the
    /// backend cannot be initialized.
    pub fn new(configuration: &PoolConfiguration) -> Result<Self> {
        configuration.validate_all()?;
        let backend = build_backend(
            &configuration.backend_connection,
            &configuration.namespace_key,
        )?;
        Ok(Self::with_backend(configuration, backend))
    }

    /// Build a pool over an existing backend
    pub fn with_backend(configuration: &PoolConfiguration, backend: Arc<dyn BlobBackend>) -> Self {
        Self {
            namespace_key: configuration.namespace_key.clone(),
            policy: SizePolicy::new(configuration.maximum_size),
            backend,
            metrics: Arc::new(PoolMetrics::new()),
        }
    }

    pub fn namespace_key(&self) -> &str {
        &self.namespace_key
    }

    pub fn maximum_size(&self) -> u64 {
        self.policy.maximum_size()
    }

    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    pub fn metrics(&self) -> &Arc<PoolMetrics> {
        &self.metrics
    }

    pub fn size_allowed(&self, size: u64) -> bool {
        self.policy.allows(size)
    }

    /// Classify a batch into matched, unmatched and policy-rejected
    ///
    /// Exact duplicates are reported once, in first-occurrence order. Each
    /// distinct checksum is looked up at most once. A backend failure fails
    /// the whole batch so no descriptor is misreported as unmatched.
    pub fn match_resources(&self, descriptors: &[ResourceDescriptor]) -> Result<MatchReport> {
        let mut report = MatchReport::default();
        let mut recorded: HashMap<Checksum, Option<u64>> = HashMap::new();

        for descriptor in dedup_descriptors(descriptors) {
            let classification = if !self.policy.allows(descriptor.size) {
                Classification::Rejected
            } else {
                let size = match recorded.get(&descriptor.checksum) {
                    Some(size) => *size,
                    None => {
                        let size = self.lookup(&descriptor.checksum)?;
                        recorded.insert(descriptor.checksum, size);
                        size
                    }
                };
                classify(&descriptor, size)
            };

            match classification {
                Classification::Matched => {
                    self.metrics.record_matched();
                    report.matched.push(descriptor);
                }
                Classification::Unmatched => {
                    self.metrics.record_unmatched();
                    report.unmatched.push(descriptor);
                }
                Classification::SizeMismatch(size) => {
                    let anomaly = PoolError::ChecksumSizeMismatch {
                        checksum: descriptor.checksum.to_string(),
                        declared: descriptor.size,
                        recorded: size,
                    };
                    warn!(
                        checksum = %descriptor.checksum,
                        declared = descriptor.size,
                        recorded = size,
                        "{}",
                        anomaly
                    );
                    self.metrics.record_size_mismatch();
                    report.unmatched.push(descriptor);
                }
                Classification::Rejected => {
                    warn!(
                        checksum = %descriptor.checksum,
                        size = descriptor.size,
                        maximum_size = self.policy.maximum_size(),
                        "Rejected oversized resource"
                    );
                    self.metrics.record_rejected();
                    report.rejected.push(descriptor);
                }
            }
        }

        debug!(
            matched = report.matched.len(),
            unmatched = report.unmatched.len(),
            rejected = report.rejected.len(),
            "Matched resource batch"
        );
        Ok(report)
    }

    /// Whether an entry with the declared size is already stored
    pub fn resource_known(&self, descriptor: &ResourceDescriptor) -> Result<bool> {
        if !self.policy.allows(descriptor.size) {
            return Ok(false);
        }
        let recorded = self.lookup(&descriptor.checksum)?;
        Ok(classify(descriptor, recorded) == Classification::Matched)
    }

    /// Backend-recorded sizes of the descriptors that are present
    pub fn resource_sizes(&self, descriptors: &[ResourceDescriptor]) -> Result<Vec<ResourceDescriptor>> {
        let mut seen = HashSet::new();
        let mut sizes = Vec::new();

        for descriptor in descriptors {
            if !seen.insert(descriptor.checksum) {
                continue;
            }
            if let Some(size) = self.lookup(&descriptor.checksum)? {
                sizes.push(ResourceDescriptor::new(descriptor.checksum, size));
            }
        }
        Ok(sizes)
    }

    /// Store `content` under the key derived from the declared checksum
    ///
    /// The checksum is trusted, not recomputed. The size is enforced twice:
    /// the declared size up front, then the real byte count while streaming.
    /// The returned descriptor carries the number of bytes actually written.
    pub fn add_resource<R: Read>(
        &self,
        content: R,
        declared: &ResourceDescriptor,
    ) -> Result<ResourceDescriptor> {
        if let Err(e) = self.policy.check_declared(declared) {
            warn!(
                checksum = %declared.checksum,
                size = declared.size,
                maximum_size = self.policy.maximum_size(),
                "Refused oversized upload"
            );
            self.metrics.record_rejected();
            return Err(e);
        }

        let key = derive_key(&declared.checksum);
        let mut limited = self.policy.limit(content);

        let written = match self.backend.put(&key, &mut limited) {
            Ok(written) => written,
            Err(_) if limited.exceeded() => {
                warn!(
                    checksum = %declared.checksum,
                    declared = declared.size,
                    consumed = limited.consumed(),
                    maximum_size = self.policy.maximum_size(),
                    "Aborted upload that exceeded the maximum size"
                );
                self.metrics.record_rejected();
                return Err(limited.to_error());
            }
            Err(e) => {
                self.metrics.record_backend_failure();
                return Err(e);
            }
        };

        if written != declared.size {
            warn!(
                checksum = %declared.checksum,
                declared = declared.size,
                written,
                "Stored size differs from declared size"
            );
        }

        self.metrics.record_stored(written);
        info!(
            checksum = %declared.checksum,
            key = %key,
            size = written,
            "Stored resource"
        );
        Ok(ResourceDescriptor::new(declared.checksum, written))
    }

    /// Add every regular file under `path`
    ///
    /// Oversized files are skipped with a warning. Files with identical
    /// content are stored once. Returns the stored descriptors in walk order.
    pub fn add_directory(&self, path: &Path) -> Result<Vec<ResourceDescriptor>> {
        let mut seen = HashSet::new();
        let mut stored = Vec::new();

        for entry in WalkDir::new(path).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| PoolError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file_path = entry.path();
            let length = entry.metadata().map_err(|e| PoolError::Io(e.into()))?.len();
            if !self.policy.allows(length) {
                warn!(
                    path = %file_path.display(),
                    size = length,
                    maximum_size = self.policy.maximum_size(),
                    "Skipping oversized file"
                );
                self.metrics.record_rejected();
                continue;
            }

            let (checksum, size) = Checksum::compute_reader(File::open(file_path)?)?;
            if !seen.insert(checksum) {
                debug!(path = %file_path.display(), checksum = %checksum, "Skipping duplicate content");
                continue;
            }

            let descriptor = ResourceDescriptor::new(checksum, size);
            let added = self
                .add_resource(File::open(file_path)?, &descriptor)
                .map_err(|e| e.with_context(file_path.display().to_string()))?;
            stored.push(added);
        }

        info!(
            path = %path.display(),
            stored = stored.len(),
            "Added directory to resource pool"
        );
        Ok(stored)
    }

    /// Materialize a pooled entry at `destination`; returns the bytes written
    pub fn copy(&self, descriptor: &ResourceDescriptor, destination: &Path) -> Result<u64> {
        let content = self.get(&descriptor.checksum)?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(destination, &content)?;

        debug!(
            checksum = %descriptor.checksum,
            destination = %destination.display(),
            size = content.len(),
            "Copied resource out of pool"
        );
        Ok(content.len() as u64)
    }

    pub fn get(&self, checksum: &Checksum) -> Result<Bytes> {
        let key = derive_key(checksum);
        self.backend.get(&key).inspect_err(|e| self.note_failure(e))
    }

    /// Remove an entry (operational tooling only)
    pub fn delete(&self, checksum: &Checksum) -> Result<()> {
        let key = derive_key(checksum);
        self.backend.delete(&key).inspect_err(|e| self.note_failure(e))?;
        info!(checksum = %checksum, key = %key, "Deleted resource");
        Ok(())
    }

    /// Backend-recorded size, `None` when absent
    pub fn stat(&self, checksum: &Checksum) -> Result<Option<u64>> {
        self.lookup(checksum)
    }

    fn lookup(&self, checksum: &Checksum) -> Result<Option<u64>> {
        let key = derive_key(checksum);
        self.backend.exists(&key).inspect_err(|e| self.note_failure(e))
    }

    fn note_failure(&self, error: &PoolError) {
        if !error.is_not_found() {
            self.metrics.record_backend_failure();
        }
    }
}

fn classify(descriptor: &ResourceDescriptor, recorded: Option<u64>) -> Classification {
    match recorded {
        None => Classification::Unmatched,
        Some(size) if size == descriptor.size => Classification::Matched,
        Some(size) => Classification::SizeMismatch(size),
    }
}
