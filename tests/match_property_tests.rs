//! Property-based tests for matching and key derivation
//!
//! For any set of stored contents and any batch of descriptors, a descriptor
//! is matched iff an entry exists at its key with exactly the declared size,
//! rejected iff it is larger than the maximum, and unmatched otherwise.

mod common;

use common::memory_pool;
use proptest::prelude::*;
use resource_pool::storage::derive_key;
use resource_pool::{Checksum, ResourceDescriptor};
use std::collections::{HashMap, HashSet};

const MAXIMUM_SIZE: u64 = 256;

fn checksum() -> impl Strategy<Value = Checksum> {
    any::<[u8; 20]>().prop_map(Checksum::from_bytes)
}

/// Contents up to a little past the maximum
fn stored_contents() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8)
}

/// How a looked-up descriptor relates to the stored contents
#[derive(Debug, Clone)]
enum Lookup {
    /// Index into the stored contents, with its real size
    Stored(usize),
    /// Index into the stored contents, with a wrong size
    WrongSize(usize, u64),
    /// Content that was never stored
    Absent(Vec<u8>),
    /// Declared size over the maximum
    Oversized(u64),
}

fn lookup() -> impl Strategy<Value = Lookup> {
    prop_oneof![
        (0usize..8).prop_map(Lookup::Stored),
        (0usize..8, 0u64..MAXIMUM_SIZE * 2).prop_map(|(i, size)| Lookup::WrongSize(i, size)),
        prop::collection::vec(any::<u8>(), 64..80).prop_map(Lookup::Absent),
        (MAXIMUM_SIZE + 1..u64::MAX).prop_map(Lookup::Oversized),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_key_is_deterministic(c in checksum()) {
        prop_assert_eq!(derive_key(&c), derive_key(&c));
        prop_assert!(derive_key(&c).to_string().ends_with(&c.to_hex()));
    }

    #[test]
    fn prop_distinct_checksums_never_share_a_key(a in checksum(), b in checksum()) {
        prop_assume!(a != b);
        prop_assert_ne!(derive_key(&a), derive_key(&b));
    }

    #[test]
    fn prop_match_reports_exactly_the_stored_sizes(
        contents in stored_contents(),
        lookups in prop::collection::vec(lookup(), 0..16),
    ) {
        let (pool, _backend) = memory_pool(MAXIMUM_SIZE);

        let mut recorded: HashMap<Checksum, u64> = HashMap::new();
        for content in &contents {
            let descriptor = ResourceDescriptor::of(content);
            pool.add_resource(&content[..], &descriptor).unwrap();
            recorded.insert(descriptor.checksum, descriptor.size);
        }

        let batch: Vec<ResourceDescriptor> = lookups
            .iter()
            .filter_map(|lookup| match lookup {
                Lookup::Stored(i) => contents.get(*i).map(|c| ResourceDescriptor::of(c)),
                Lookup::WrongSize(i, size) => contents
                    .get(*i)
                    .map(|c| ResourceDescriptor::new(Checksum::compute(c), *size)),
                Lookup::Absent(c) => Some(ResourceDescriptor::of(c)),
                Lookup::Oversized(size) => {
                    Some(ResourceDescriptor::new(Checksum::compute(b"oversized"), *size))
                }
            })
            .collect();

        let report = pool.match_resources(&batch).unwrap();

        let unique: HashSet<_> = batch.iter().copied().collect();
        prop_assert_eq!(report.len(), unique.len());

        for descriptor in &unique {
            let expected_rejected = descriptor.size > MAXIMUM_SIZE;
            let expected_matched =
                !expected_rejected && recorded.get(&descriptor.checksum) == Some(&descriptor.size);

            prop_assert_eq!(report.is_rejected(descriptor), expected_rejected);
            prop_assert_eq!(report.is_matched(descriptor), expected_matched);
            prop_assert_eq!(
                report.unmatched.contains(descriptor),
                !expected_rejected && !expected_matched
            );
        }
    }
}
