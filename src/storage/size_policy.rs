//! Maximum object size policy
//!
//! Enforced twice: against the declared size when matching and against the
//! real byte count while content streams into a backend, so a small declared
//! size cannot smuggle a large object past the match-time check.

use crate::error::{PoolError, Result};
use crate::models::ResourceDescriptor;
use std::io::{self, Read};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePolicy {
    maximum_size: u64,
}

impl SizePolicy {
    pub fn new(maximum_size: u64) -> Self {
        Self { maximum_size }
    }

    pub fn maximum_size(&self) -> u64 {
        self.maximum_size
    }

    /// `size == maximum_size` is allowed
    pub fn allows(&self, size: u64) -> bool {
        size <= self.maximum_size
    }

    /// Match-time check against the declared size
    pub fn check_declared(&self, descriptor: &ResourceDescriptor) -> Result<()> {
        if self.allows(descriptor.size) {
            Ok(())
        } else {
            Err(PoolError::size_exceeded(descriptor.size, self.maximum_size))
        }
    }

    /// Wrap a reader so it fails once more than `maximum_size` bytes come through
    pub fn limit<R: Read>(&self, inner: R) -> SizeLimitedReader<R> {
        SizeLimitedReader {
            inner,
            maximum: self.maximum_size,
            consumed: 0,
            exceeded: false,
        }
    }
}

/// Reader that measures what passes through and refuses to go past the limit
///
/// After an error, [`SizeLimitedReader::exceeded`] tells a size violation
/// apart from an ordinary I/O failure of the inner reader.
#[derive(Debug)]
pub struct SizeLimitedReader<R> {
    inner: R,
    maximum: u64,
    consumed: u64,
    exceeded: bool,
}

impl<R> SizeLimitedReader<R> {
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn exceeded(&self) -> bool {
        self.exceeded
    }

    pub fn to_error(&self) -> PoolError {
        PoolError::size_exceeded(self.consumed, self.maximum)
    }
}

impl<R: Read> Read for SizeLimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.exceeded {
            return Err(size_error(self.consumed, self.maximum));
        }

        let n = self.inner.read(buf)?;
        self.consumed += n as u64;

        if self.consumed > self.maximum {
            self.exceeded = true;
            return Err(size_error(self.consumed, self.maximum));
        }
        Ok(n)
    }
}

fn size_error(consumed: u64, maximum: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("content exceeds maximum size: read {} of at most {} bytes", consumed, maximum),
    )
}
