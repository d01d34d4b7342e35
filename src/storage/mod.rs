//! Content-Addressable Resource Storage
//!
//! Application resources are stored once, keyed by their SHA-1 digest, in a
//! sharded namespace on a pluggable backend:
//!
//! ```text
//! <backend root or bucket>/<namespace_key>/
//! ├── a9/
//! │   └── 99/
//! │       └── a9993e364706816aba3e25717850c26c9cd0d89d
//! └── da/
//!     └── 39/
//!         └── da39a3ee5e6b4b0d3255bfef95601890afd80709
//! ```
//!
//! - [`derive_key`] maps a checksum to its [`StorageKey`]
//! - [`SizePolicy`] enforces the maximum object size
//! - [`BlobBackend`] is the uniform put/get/exists/delete capability set
//! - [`ResourcePool`] matches and stores descriptors on top of them

pub mod backend;
pub mod namespace;
pub mod resource_pool;
pub mod size_policy;

pub use backend::{build_backend, BlobBackend, LocalBackend, MemoryBackend, RemoteBackend};
pub use namespace::{derive_key, StorageKey, SHARD_LEVELS, SHARD_WIDTH};
pub use resource_pool::ResourcePool;
pub use size_policy::{SizeLimitedReader, SizePolicy};
