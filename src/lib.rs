//! 资源池 - 内容寻址的应用资源存储
//!
//! Application artifacts uploaded by many users are deduplicated globally by
//! SHA-1. A client first asks which of its files the pool already holds
//! ([`PoolController::match_resources`]) and then uploads only the rest
//! ([`PoolController::add_resource`]).
//!
//! - [`storage`]: key derivation, size policy, blob backends and the
//!   blocking [`ResourcePool`]
//! - [`bridge`]: worker pool that keeps every blocking call off the
//!   controlling async runtime
//! - [`infrastructure`]: configuration and logging setup
//!
//! ```no_run
//! use resource_pool::{PoolConfiguration, PoolController, ResourceDescriptor};
//!
//! # async fn run() -> resource_pool::Result<()> {
//! let configuration = PoolConfiguration::load("resource_pool.toml")?;
//! let controller = PoolController::start(&configuration)?;
//!
//! let descriptor = ResourceDescriptor::of(b"hello");
//! let report = controller.match_resources(vec![descriptor]).await?;
//! if !report.is_matched(&descriptor) {
//!     controller.add_resource(&b"hello"[..], descriptor).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod monitoring;
pub mod storage;
pub mod utils;

pub use bridge::{OperationId, OperationState, PendingOperation, PoolController, PoolOutput};
pub use error::{PoolError, Result};
pub use infrastructure::config::{BackendConnection, Credentials, PoolConfiguration, Provider};
pub use models::{Checksum, MatchReport, ResourceDescriptor};
pub use monitoring::{MetricsSnapshot, PoolMetrics};
pub use storage::{derive_key, BlobBackend, ResourcePool, StorageKey};
