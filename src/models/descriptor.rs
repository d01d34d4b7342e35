//! Content descriptors
//!
//! A descriptor names a piece of content by its SHA-1 digest and declares its
//! size. Descriptors arrive from clients in upload manifests as
//! `{"sha1": "...", "size": N}`.

use crate::error::{PoolError, Result};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Length of a SHA-1 digest in bytes (160 bits)
pub const CHECKSUM_LEN: usize = 20;

/// 160-bit content digest
///
/// Parsed from and rendered as 40 lowercase hexadecimal characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum([u8; CHECKSUM_LEN]);

impl Checksum {
    pub fn from_bytes(bytes: [u8; CHECKSUM_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CHECKSUM_LEN] {
        &self.0
    }

    /// Lowercase hexadecimal representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Compute the SHA-1 digest of in-memory content
    ///
    /// # Example
    ///
    /// ```
    /// use resource_pool::models::Checksum;
    ///
    /// let checksum = Checksum::compute(b"abc");
    /// assert_eq!(checksum.to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    /// ```
    pub fn compute(content: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(content);
        Self(hasher.finalize().into())
    }

    /// Compute the SHA-1 digest of a stream, returning it with the byte count
    ///
    /// Uses an 8KB buffer so large files are never loaded into memory.
    pub fn compute_reader<R: Read>(mut reader: R) -> std::io::Result<(Self, u64)> {
        const BUFFER_SIZE: usize = 8 * 1024;

        let mut hasher = Sha1::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut total = 0u64;

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
            total += bytes_read as u64;
        }

        Ok((Self(hasher.finalize().into()), total))
    }
}

impl FromStr for Checksum {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != CHECKSUM_LEN * 2 {
            return Err(PoolError::InvalidChecksum(format!(
                "expected {} hex characters, got {}",
                CHECKSUM_LEN * 2,
                s.len()
            )));
        }

        let mut bytes = [0u8; CHECKSUM_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| PoolError::InvalidChecksum(format!("{}: {}", s, e)))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Checksum {
    type Error = PoolError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.to_hex()
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

/// A content digest plus its declared byte count
///
/// The storage location is derived from `checksum` alone; `size` is declared
/// metadata that is checked against what the backend recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(rename = "sha1")]
    pub checksum: Checksum,
    pub size: u64,
}

impl ResourceDescriptor {
    pub fn new(checksum: Checksum, size: u64) -> Self {
        Self { checksum, size }
    }

    /// Describe in-memory content
    pub fn of(content: &[u8]) -> Self {
        Self {
            checksum: Checksum::compute(content),
            size: content.len() as u64,
        }
    }
}

/// Drop exact duplicates while keeping first-occurrence order
pub fn dedup_descriptors(descriptors: &[ResourceDescriptor]) -> Vec<ResourceDescriptor> {
    let mut seen = HashSet::with_capacity(descriptors.len());
    descriptors
        .iter()
        .filter(|d| seen.insert(**d))
        .copied()
        .collect()
}

/// Result of classifying a batch of descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Already stored with the declared size
    pub matched: Vec<ResourceDescriptor>,
    /// Need to be uploaded
    pub unmatched: Vec<ResourceDescriptor>,
    /// Larger than the pool's maximum size; never eligible for deduplication
    pub rejected: Vec<ResourceDescriptor>,
}

impl MatchReport {
    pub fn is_matched(&self, descriptor: &ResourceDescriptor) -> bool {
        self.matched.contains(descriptor)
    }

    pub fn is_rejected(&self, descriptor: &ResourceDescriptor) -> bool {
        self.rejected.contains(descriptor)
    }

    pub fn len(&self) -> usize {
        self.matched.len() + self.unmatched.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append another partial report, keeping order
    pub fn merge(&mut self, other: MatchReport) {
        self.matched.extend(other.matched);
        self.unmatched.extend(other.unmatched);
        self.rejected.extend(other.rejected);
    }
}
