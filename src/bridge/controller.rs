//! Controller-side facade over the resource pool
//!
//! [`PoolController`] lives on the controlling runtime. Each method reserves
//! an operation id, registers a oneshot waiter for it, dispatches the
//! blocking call to the worker pool and returns without blocking. A pump task
//! on the same runtime drains the delivery channel and routes each outcome to
//! its waiter by id.
//!
//! Dropping a [`PendingOperation`] abandons interest in the result only; the
//! operation still runs to completion and its outcome is discarded.

use super::worker::{Bridge, Delivery, OperationTracker};
use super::{OperationId, OperationState};
use crate::error::{PoolError, Result};
use crate::infrastructure::config::PoolConfiguration;
use crate::models::{dedup_descriptors, Checksum, MatchReport, ResourceDescriptor};
use crate::monitoring::PoolMetrics;
use crate::storage::ResourcePool;
use bytes::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::io::Read;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

const WORKER_THREAD_NAME: &str = "resource-pool-worker";

/// Result payload of any pool operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolOutput {
    Matched(MatchReport),
    Stored(ResourceDescriptor),
    StoredMany(Vec<ResourceDescriptor>),
    Content(Bytes),
    Stat(Option<u64>),
    Sizes(Vec<ResourceDescriptor>),
    Deleted,
    Copied(u64),
}

impl PoolOutput {
    fn kind(&self) -> &'static str {
        match self {
            PoolOutput::Matched(_) => "Matched",
            PoolOutput::Stored(_) => "Stored",
            PoolOutput::StoredMany(_) => "StoredMany",
            PoolOutput::Content(_) => "Content",
            PoolOutput::Stat(_) => "Stat",
            PoolOutput::Sizes(_) => "Sizes",
            PoolOutput::Deleted => "Deleted",
            PoolOutput::Copied(_) => "Copied",
        }
    }

    fn unexpected(self, expected: &str) -> PoolError {
        PoolError::Internal(format!(
            "expected {} output, got {}",
            expected,
            self.kind()
        ))
    }
}

type Waiters = DashMap<OperationId, oneshot::Sender<Result<PoolOutput>>>;

/// Handle to an operation that has been dispatched
///
/// Resolves to exactly one outcome. Dropping it discards the outcome without
/// cancelling the operation.
#[derive(Debug)]
pub struct PendingOperation {
    id: OperationId,
    receiver: oneshot::Receiver<Result<PoolOutput>>,
}

impl PendingOperation {
    pub fn id(&self) -> OperationId {
        self.id
    }
}

impl Future for PendingOperation {
    type Output = Result<PoolOutput>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(PoolError::WorkerLost(format!(
                    "{} ended without a delivery",
                    id
                )))
            })
        })
    }
}

/// Non-blocking entry point to the resource pool for the controlling runtime
pub struct PoolController {
    bridge: Bridge<ResourcePool, PoolOutput>,
    waiters: Arc<Waiters>,
    metrics: Arc<PoolMetrics>,
    maximum_size: u64,
}

impl PoolController {
    /// Build the pool from configuration and start its workers
    ///
    /// Must be called from within a tokio runtime; the delivery pump is
    /// spawned onto it.
    pub fn start(configuration: &PoolConfiguration) -> Result<Self> {
        let pool = ResourcePool::new(configuration)?;
        Self::with_pool(pool, configuration.bridge.worker_threads)
    }

    /// Start workers over an already built pool
    ///
    /// The controller keeps no handle on the pool itself, so the backend is
    /// released on a worker thread once the last worker exits.
    pub fn with_pool(pool: ResourcePool, worker_threads: usize) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            PoolError::Internal("PoolController must be started inside a tokio runtime".to_string())
        })?;

        let metrics = Arc::clone(pool.metrics());
        let maximum_size = pool.maximum_size();
        let namespace_key = pool.namespace_key().to_string();

        let (bridge, deliveries) =
            Bridge::start(Arc::new(pool), worker_threads, WORKER_THREAD_NAME)?;
        let waiters: Arc<Waiters> = Arc::new(DashMap::new());
        // Runs until every worker has exited and the delivery channel closes
        runtime.spawn(pump_deliveries(
            deliveries,
            Arc::clone(&waiters),
            bridge.tracker().clone(),
        ));

        info!(
            namespace_key = %namespace_key,
            worker_threads,
            maximum_size,
            "Resource pool controller started"
        );

        Ok(Self {
            bridge,
            waiters,
            metrics,
            maximum_size,
        })
    }

    pub fn metrics(&self) -> &Arc<PoolMetrics> {
        &self.metrics
    }

    pub fn worker_threads(&self) -> usize {
        self.bridge.worker_threads()
    }

    /// Pure check, answered without leaving the controlling context
    pub fn size_allowed(&self, size: u64) -> bool {
        size <= self.maximum_size
    }

    pub fn operation_state(&self, id: OperationId) -> Option<OperationState> {
        self.bridge.state(id)
    }

    /// Operations dispatched but not yet delivered
    pub fn in_flight(&self) -> usize {
        self.bridge.in_flight()
    }

    /// Dispatch an arbitrary blocking job against the pool
    ///
    /// Returns immediately. The waiter is registered before the job is
    /// queued, so even an instant completion is routed correctly.
    pub fn submit<F>(&self, job: F) -> PendingOperation
    where
        F: FnOnce(&ResourcePool) -> Result<PoolOutput> + Send + 'static,
    {
        let id = self.bridge.reserve_id();
        let (sender, receiver) = oneshot::channel();
        self.waiters.insert(id, sender);

        if let Err(e) = self.bridge.dispatch(id, job) {
            // No worker will ever deliver this id: fail it here instead
            if let Some((_, sender)) = self.waiters.remove(&id) {
                let _ = sender.send(Err(e));
            }
        } else {
            debug!(operation_id = %id, "Dispatched pool operation");
        }

        PendingOperation { id, receiver }
    }

    /// Classify descriptors as matched, unmatched or rejected
    ///
    /// Lookups are split across up to `worker_threads` concurrent operations
    /// and merged back in input order.
    pub async fn match_resources(&self, descriptors: Vec<ResourceDescriptor>) -> Result<MatchReport> {
        let unique = dedup_descriptors(&descriptors);
        if unique.is_empty() {
            return Ok(MatchReport::default());
        }

        let parts = self.worker_threads().min(unique.len());
        let chunk_size = unique.len().div_ceil(parts);

        let pending: Vec<PendingOperation> = unique
            .chunks(chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                self.submit(move |pool| pool.match_resources(&chunk).map(PoolOutput::Matched))
            })
            .collect();

        let mut report = MatchReport::default();
        for operation in pending {
            match operation.await? {
                PoolOutput::Matched(part) => report.merge(part),
                other => return Err(other.unexpected("Matched")),
            }
        }
        Ok(report)
    }

    /// Stream `content` into the pool under the declared descriptor
    pub async fn add_resource<R>(&self, content: R, declared: ResourceDescriptor) -> Result<ResourceDescriptor>
    where
        R: Read + Send + 'static,
    {
        match self
            .submit(move |pool| pool.add_resource(content, &declared).map(PoolOutput::Stored))
            .await?
        {
            PoolOutput::Stored(stored) => Ok(stored),
            other => Err(other.unexpected("Stored")),
        }
    }

    pub async fn add_directory(&self, path: impl Into<PathBuf>) -> Result<Vec<ResourceDescriptor>> {
        let path = path.into();
        match self
            .submit(move |pool| pool.add_directory(&path).map(PoolOutput::StoredMany))
            .await?
        {
            PoolOutput::StoredMany(stored) => Ok(stored),
            other => Err(other.unexpected("StoredMany")),
        }
    }

    pub async fn copy(&self, descriptor: ResourceDescriptor, destination: impl Into<PathBuf>) -> Result<u64> {
        let destination = destination.into();
        match self
            .submit(move |pool| pool.copy(&descriptor, &destination).map(PoolOutput::Copied))
            .await?
        {
            PoolOutput::Copied(written) => Ok(written),
            other => Err(other.unexpected("Copied")),
        }
    }

    pub async fn resource_sizes(&self, descriptors: Vec<ResourceDescriptor>) -> Result<Vec<ResourceDescriptor>> {
        if descriptors.is_empty() {
            return Ok(Vec::new());
        }
        match self
            .submit(move |pool| pool.resource_sizes(&descriptors).map(PoolOutput::Sizes))
            .await?
        {
            PoolOutput::Sizes(sizes) => Ok(sizes),
            other => Err(other.unexpected("Sizes")),
        }
    }

    pub async fn get(&self, checksum: Checksum) -> Result<Bytes> {
        match self
            .submit(move |pool| pool.get(&checksum).map(PoolOutput::Content))
            .await?
        {
            PoolOutput::Content(content) => Ok(content),
            other => Err(other.unexpected("Content")),
        }
    }

    pub async fn delete(&self, checksum: Checksum) -> Result<()> {
        match self
            .submit(move |pool| pool.delete(&checksum).map(|()| PoolOutput::Deleted))
            .await?
        {
            PoolOutput::Deleted => Ok(()),
            other => Err(other.unexpected("Deleted")),
        }
    }

    pub async fn stat(&self, checksum: Checksum) -> Result<Option<u64>> {
        match self
            .submit(move |pool| pool.stat(&checksum).map(PoolOutput::Stat))
            .await?
        {
            PoolOutput::Stat(size) => Ok(size),
            other => Err(other.unexpected("Stat")),
        }
    }
}

async fn pump_deliveries(
    mut deliveries: mpsc::UnboundedReceiver<Delivery<PoolOutput>>,
    waiters: Arc<Waiters>,
    tracker: OperationTracker,
) {
    while let Some(Delivery { id, outcome }) = deliveries.recv().await {
        tracker.mark_delivered(id);
        let Some((_, sender)) = waiters.remove(&id) else {
            debug!(operation_id = %id, "Delivery without a registered waiter");
            continue;
        };
        if sender.send(outcome).is_err() {
            debug!(operation_id = %id, "Operation abandoned by caller, outcome discarded");
        }
    }
    debug!("Delivery pump stopped");
}
