//! Error taxonomy shared by the engine and the wire protocol.
//!
//! The catalog of kinds is closed: the protocol maps reply codes onto these
//! variants and back, so free-form strings only ever travel inside
//! [`Error::Unexpected`].

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Algorithm name not in the catalog. Fatal at construction.
    #[error("unsupported hash algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    /// Glob pattern failed to parse. Fatal at construction.
    #[error("invalid glob pattern: {0}")]
    InvalidPattern(String),

    /// Named path missing on the peer or under every candidate directory.
    #[error("{path}: no such file")]
    NoSuchFile { path: String },

    /// Bytes read differ from the recorded or expected size.
    #[error("{path}: size mismatched ({want} != {got})")]
    SizeMismatch { path: String, want: u64, got: u64 },

    /// Per-file local digest, or per-file running global digest, differs.
    #[error("{path}: checksum mismatched ({} != {})", hex::encode(.want), hex::encode(.got))]
    ChecksumMismatch {
        path: String,
        want: Vec<u8>,
        got: Vec<u8>,
    },

    /// Final count/total/global disagreement. Always fatal.
    #[error("aggregate mismatched: {0}")]
    AggregateMismatch(String),

    /// Malformed frame, unknown tag, truncated read. The connection is torn
    /// down after this.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The peer reported an error outside the closed catalog.
    #[error("unexpected remote error: {0}")]
    Unexpected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a synchronize run may fall back to COPY after this failure.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NoSuchFile { .. } | Error::SizeMismatch { .. } | Error::ChecksumMismatch { .. }
        )
    }
}
