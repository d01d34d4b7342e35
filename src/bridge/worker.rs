//! Bounded worker pool behind the bridge

use super::{OperationId, OperationState};
use crate::error::{PoolError, Result};
use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// A blocking unit of work run against the shared service
pub type Job<S, T> = Box<dyn FnOnce(&S) -> Result<T> + Send + 'static>;

/// Terminal notification for one operation
#[derive(Debug)]
pub struct Delivery<T> {
    pub id: OperationId,
    pub outcome: Result<T>,
}

struct Task<S, T> {
    id: OperationId,
    job: Job<S, T>,
}

/// Fixed-size pool of named worker threads fed by an unbounded queue
///
/// Saturation queues work; it never spawns more threads. Dropping the bridge
/// closes the queue: workers finish what is already queued, then exit and
/// drop their handle on the service.
pub struct Bridge<S, T> {
    queue: Sender<Task<S, T>>,
    tracker: OperationTracker,
    worker_threads: usize,
}

/// Shared table of operation states
///
/// Entries live from id reservation until delivery. Ids are issued in
/// increasing order, so an issued id with no entry has been delivered.
/// Outcomes dropped because the delivery channel closed keep a `Discarded`
/// entry.
#[derive(Debug, Clone, Default)]
pub struct OperationTracker {
    states: Arc<DashMap<OperationId, OperationState>>,
    next_id: Arc<AtomicU64>,
}

impl OperationTracker {
    fn reserve(&self) -> OperationId {
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.states.insert(id, OperationState::Submitted);
        id
    }

    fn set(&self, id: OperationId, state: OperationState) {
        self.states.insert(id, state);
    }

    fn forget(&self, id: OperationId) {
        self.states.remove(&id);
    }

    /// Record that the delivery for `id` reached the controlling context
    pub fn mark_delivered(&self, id: OperationId) {
        self.forget(id);
    }

    /// `Delivered` only for outcomes that reached the delivery channel's
    /// receiver; see `Discarded` for the rest
    pub fn state(&self, id: OperationId) -> Option<OperationState> {
        if let Some(state) = self.states.get(&id) {
            return Some(*state);
        }
        (id.as_u64() < self.next_id.load(Ordering::Relaxed)).then_some(OperationState::Delivered)
    }

    /// Operations issued but neither delivered nor discarded
    pub fn in_flight(&self) -> usize {
        self.states
            .iter()
            .filter(|entry| *entry.value() != OperationState::Discarded)
            .count()
    }
}

impl<S, T> Bridge<S, T>
where
    S: Send + Sync + 'static,
    T: Send + 'static,
{
    /// Spawn `worker_threads` workers sharing `service`
    ///
    /// Returns the bridge plus the receiving end of the delivery channel,
    /// which the controlling context drains.
    pub fn start(
        service: Arc<S>,
        worker_threads: usize,
        thread_name: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Delivery<T>>)> {
        if worker_threads == 0 {
            return Err(PoolError::configuration(
                "bridge requires at least one worker thread",
            ));
        }

        let (queue, jobs) = channel::unbounded::<Task<S, T>>();
        let (deliveries, delivered) = mpsc::unbounded_channel();
        let tracker = OperationTracker::default();

        for index in 0..worker_threads {
            let worker = Worker {
                index,
                service: Arc::clone(&service),
                jobs: jobs.clone(),
                deliveries: deliveries.clone(),
                tracker: tracker.clone(),
            };
            thread::Builder::new()
                .name(format!("{}-{}", thread_name, index))
                .spawn(move || worker.run())?;
        }

        debug!(worker_threads, thread_name, "Started bridge worker pool");

        Ok((
            Self {
                queue,
                tracker,
                worker_threads,
            },
            delivered,
        ))
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    /// Allocate an id so the caller can register interest before dispatch
    pub fn reserve_id(&self) -> OperationId {
        self.tracker.reserve()
    }

    /// Queue a job under a reserved id; never blocks
    ///
    /// # Errors
    ///
    /// `PoolError::WorkerLost` when every worker has exited. No delivery will
    /// be produced for the id in that case.
    pub fn dispatch<F>(&self, id: OperationId, job: F) -> Result<()>
    where
        F: FnOnce(&S) -> Result<T> + Send + 'static,
    {
        // Recorded before the send so a fast worker cannot be overwritten
        self.tracker.set(id, OperationState::Dispatched);

        let task = Task {
            id,
            job: Box::new(job),
        };
        if self.queue.send(task).is_err() {
            self.tracker.forget(id);
            error!(operation_id = %id, "No worker left to run operation");
            return Err(PoolError::WorkerLost(format!(
                "worker pool stopped before {} was dispatched",
                id
            )));
        }
        Ok(())
    }

    pub fn submit<F>(&self, job: F) -> Result<OperationId>
    where
        F: FnOnce(&S) -> Result<T> + Send + 'static,
    {
        let id = self.reserve_id();
        self.dispatch(id, job)?;
        Ok(id)
    }

    pub fn mark_delivered(&self, id: OperationId) {
        self.tracker.mark_delivered(id);
    }

    pub fn state(&self, id: OperationId) -> Option<OperationState> {
        self.tracker.state(id)
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.in_flight()
    }

    /// Jobs waiting for a free worker
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

struct Worker<S, T> {
    index: usize,
    service: Arc<S>,
    jobs: Receiver<Task<S, T>>,
    deliveries: mpsc::UnboundedSender<Delivery<T>>,
    tracker: OperationTracker,
}

impl<S, T> Worker<S, T> {
    fn run(self) {
        debug!(worker = self.index, "Bridge worker started");

        while let Ok(Task { id, job }) = self.jobs.recv() {
            self.tracker.set(id, OperationState::Executing);

            let service = &*self.service;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(service)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    error!(operation_id = %id, worker = self.index, panic = %message, "Operation panicked");
                    Err(PoolError::WorkerLost(format!("{} panicked: {}", id, message)))
                });

            let state = if outcome.is_ok() {
                OperationState::Completed
            } else {
                OperationState::Failed
            };
            self.tracker.set(id, state);

            if self.deliveries.send(Delivery { id, outcome }).is_err() {
                self.tracker.set(id, OperationState::Discarded);
                warn!(operation_id = %id, "Delivery channel closed, dropping outcome");
            }
        }

        debug!(worker = self.index, "Bridge worker stopped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
