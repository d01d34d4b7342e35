//! Sharded storage namespace
//!
//! Keys are derived from the checksum only, never from filenames, upload
//! order or size. The first two pairs of hex characters become two directory
//! levels and the full checksum is the leaf:
//!
//! ```text
//! a9993e364706816aba3e25717850c26c9cd0d89d
//!   -> a9/99/a9993e364706816aba3e25717850c26c9cd0d89d
//! ```
//!
//! This spreads entries over 256 * 256 partitions. The layout is part of the
//! on-disk format: changing it would orphan everything already stored.

use crate::models::Checksum;
use std::fmt;
use std::path::PathBuf;

/// Hex characters per shard level
pub const SHARD_WIDTH: usize = 2;

/// Number of shard levels above the leaf
pub const SHARD_LEVELS: usize = 2;

/// Backend-facing name of a pool entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    partition: String,
    leaf: String,
}

impl StorageKey {
    /// Directory component, e.g. `a9/99`
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Leaf component (the full checksum)
    pub fn leaf(&self) -> &str {
        &self.leaf
    }

    /// `/`-separated object name used by remote and in-memory backends
    pub fn object_name(&self) -> String {
        format!("{}/{}", self.partition, self.leaf)
    }

    /// Relative filesystem path used by the local backend
    pub fn relative_path(&self) -> PathBuf {
        let mut path: PathBuf = self.partition.split('/').collect();
        path.push(&self.leaf);
        path
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.leaf)
    }
}

/// Derive the storage key for a checksum
///
/// Pure and total: every checksum has exactly one key and distinct checksums
/// never share one, because the leaf is the checksum itself.
///
/// # Example
///
/// ```
/// use resource_pool::models::Checksum;
/// use resource_pool::storage::derive_key;
///
/// let key = derive_key(&Checksum::compute(b"abc"));
/// assert_eq!(key.to_string(), "a9/99/a9993e364706816aba3e25717850c26c9cd0d89d");
/// ```
pub fn derive_key(checksum: &Checksum) -> StorageKey {
    let hex = checksum.to_hex();
    let partition = (0..SHARD_LEVELS)
        .map(|level| &hex[level * SHARD_WIDTH..(level + 1) * SHARD_WIDTH])
        .collect::<Vec<_>>()
        .join("/");

    StorageKey {
        partition,
        leaf: hex,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let checksum: Checksum = "0123456789abcdef0123456789abcdef01234567".parse().unwrap();
        let key = derive_key(&checksum);

        assert_eq!(key.partition(), "01/23");
        assert_eq!(key.leaf(), "0123456789abcdef0123456789abcdef01234567");
        assert_eq!(
            key.object_name(),
            "01/23/0123456789abcdef0123456789abcdef01234567"
        );
        assert_eq!(
            key.relative_path(),
            PathBuf::from("01")
                .join("23")
                .join("0123456789abcdef0123456789abcdef01234567")
        );
    }

    #[test]
    fn test_key_is_deterministic() {
        let checksum = Checksum::compute(b"some content");
        assert_eq!(derive_key(&checksum), derive_key(&checksum));
    }

    #[test]
    fn test_shared_prefix_different_leaf() {
        let a: Checksum = "abcd000000000000000000000000000000000000".parse().unwrap();
        let b: Checksum = "abcd000000000000000000000000000000000001".parse().unwrap();

        let (ka, kb) = (derive_key(&a), derive_key(&b));
        assert_eq!(ka.partition(), kb.partition());
        assert_ne!(ka, kb);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn prop_distinct_checksums_distinct_keys(
                a in any::<[u8; 20]>(),
                b in any::<[u8; 20]>(),
            ) {
                let (ca, cb) = (Checksum::from_bytes(a), Checksum::from_bytes(b));
                prop_assert_eq!(ca == cb, derive_key(&ca) == derive_key(&cb));
            }

            #[test]
            fn prop_partition_is_checksum_prefix(bytes in any::<[u8; 20]>()) {
                let checksum = Checksum::from_bytes(bytes);
                let key = derive_key(&checksum);
                let hex = checksum.to_hex();

                prop_assert_eq!(key.partition().replace('/', ""), &hex[..SHARD_LEVELS * SHARD_WIDTH]);
                prop_assert_eq!(key.leaf(), hex.as_str());
            }
        }
    }
}
