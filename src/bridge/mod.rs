//! 反应器-线程桥接
//!
//! The controlling context is a single-threaded async runtime that also
//! serves network traffic. It must never call a blocking backend itself, so
//! every pool operation takes this path:
//!
//! ```text
//! controller            job queue             worker threads        delivery channel
//!    │  submit(job) ──────▶ [ ][ ][ ] ──────▶  run job (blocking)  ──────▶ Delivery { id, outcome }
//!    │◀─ resumes at once                                                   │
//!    │◀──────────────────────────── routed by OperationId ◀────────────────┘
//! ```
//!
//! Per operation: `Submitted → Dispatched → Executing → Completed | Failed → Delivered`.
//! An outcome produced after the delivery channel has closed ends in
//! `Discarded` instead.
//! Exactly one [`Delivery`] is produced per dispatched job, whether the job
//! returned an error or panicked. Deliveries arrive in completion order, not
//! submission order.

mod controller;
mod worker;

pub use controller::{PendingOperation, PoolController, PoolOutput};
pub use worker::{Bridge, Delivery, Job, OperationTracker};

use serde::Serialize;
use std::fmt;

/// Correlates a delivery with the request that submitted it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OperationId(u64);

impl OperationId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// 操作状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationState {
    /// Id reserved, not yet queued
    Submitted,
    /// Queued for the worker pool
    Dispatched,
    /// A worker is running the blocking call
    Executing,
    Completed,
    Failed,
    /// Handed back to the controlling context
    Delivered,
    /// Finished after the controlling context stopped listening; the outcome was dropped
    Discarded,
}

impl OperationState {
    /// Completed or Failed: the outcome exists but has not been handed back yet
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Completed | OperationState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_id_display() {
        assert_eq!(OperationId(7).to_string(), "op-7");
        assert_eq!(OperationId(7).as_u64(), 7);
    }

    #[test]
    fn test_terminal_states() {
        assert!(OperationState::Completed.is_terminal());
        assert!(OperationState::Failed.is_terminal());
        assert!(!OperationState::Executing.is_terminal());
        assert!(!OperationState::Delivered.is_terminal());
        assert!(!OperationState::Discarded.is_terminal());
        assert_eq!(
            serde_json::to_string(&OperationState::Delivered).unwrap(),
            "\"DELIVERED\""
        );
    }
}
