//! Dual running digest: one per-file state, one per-session state.
//!
//! Both states are fed from a single write so they can never diverge; a
//! scanner gets a per-file checksum and one authoritative session checksum
//! in a single pass over the bytes.

use std::io;

use crate::error::Result;
use crate::hash::{self, Checksum};

/// A pair of streaming hash states over the same algorithm.
///
/// `local` is reset between files; `global` accumulates until
/// [`Digest::reset_all`].
pub struct Digest {
    local: Box<dyn Checksum>,
    global: Box<dyn Checksum>,
}

impl Digest {
    /// Build a digest pair for the given algorithm name.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedAlgorithm`] when the name is not
    /// in the catalog.
    pub fn new(algorithm: &str) -> Result<Self> {
        Ok(Self {
            local: hash::select(algorithm)?,
            global: hash::select(algorithm)?,
        })
    }

    /// Snapshot of the per-file digest.
    #[must_use]
    pub fn local(&self) -> Vec<u8> {
        self.local.sum()
    }

    /// Snapshot of the cumulative session digest.
    #[must_use]
    pub fn global(&self) -> Vec<u8> {
        self.global.sum()
    }

    /// Digest width in bytes, identical for both states.
    #[must_use]
    pub fn size(&self) -> usize {
        self.global.size()
    }

    /// Reset the per-file state only.
    pub fn reset(&mut self) {
        self.local.reset();
    }

    /// Reset both states.
    pub fn reset_all(&mut self) {
        self.local.reset();
        self.global.reset();
    }
}

impl io::Write for Digest {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.local.update(buf);
        self.global.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
