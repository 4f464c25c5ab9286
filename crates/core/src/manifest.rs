//! Manifest binary format, written by the scanner and read back by the
//! comparer.
//!
//! Layout (all integers big-endian, sizes as IEEE-754 doubles):
//!
//! ```text
//! header : algorithm name, 16 bytes ASCII, zero padded
//! record : size:8 | global:N | local:N | path_len:2 | path
//! trailer: 0:8 | count:8 | total:8 | global:N
//! ```
//!
//! A record size of zero is the sentinel marking end-of-records; the
//! trailer follows it. Record order is scanner discovery order, and each
//! record's global digest is the running session digest after that file.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use crate::entry::Coze;
use crate::error::{Error, Result};
use crate::hash;
use crate::wire;

/// Fixed width of the algorithm header.
pub const HEADER_LEN: usize = 16;

/// One decoded manifest record.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub size: u64,
    /// Session digest after this file.
    pub global: Vec<u8>,
    /// Digest of this file alone.
    pub local: Vec<u8>,
    /// Base-relative path; may begin with a separator.
    pub path: String,
}

/// Decoded trailer aggregates.
#[derive(Debug, Clone)]
pub struct Trailer {
    pub count: u64,
    pub size: u64,
    pub global: Vec<u8>,
}

/// Streaming manifest writer.
pub struct ManifestWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> ManifestWriter<W> {
    /// Write the 16-byte algorithm header and return the writer.
    pub fn new(w: W, algorithm: &str) -> io::Result<Self> {
        let mut inner = BufWriter::new(w);
        let mut header = [0u8; HEADER_LEN];
        let name = algorithm.as_bytes();
        let len = name.len().min(HEADER_LEN);
        header[..len].copy_from_slice(&name[..len]);
        inner.write_all(&header)?;
        Ok(Self { inner })
    }

    /// Append one record.
    pub fn record(&mut self, size: u64, global: &[u8], local: &[u8], path: &str) -> Result<()> {
        wire::write_size(&mut self.inner, size)?;
        self.inner.write_all(global)?;
        self.inner.write_all(local)?;
        wire::write_path(&mut self.inner, path)?;
        Ok(())
    }

    /// Write the sentinel and trailer, then flush.
    pub fn finish(&mut self, cz: &Coze, global: &[u8]) -> io::Result<()> {
        wire::write_size(&mut self.inner, 0)?;
        self.inner.write_all(&cz.count.to_be_bytes())?;
        wire::write_size(&mut self.inner, cz.size)?;
        self.inner.write_all(global)?;
        self.inner.flush()
    }
}

/// Streaming manifest reader.
pub struct ManifestReader<R: Read> {
    inner: BufReader<R>,
    algorithm: String,
    width: usize,
}

impl ManifestReader<File> {
    /// Open a manifest file and read its header.
    ///
    /// # Errors
    /// Fails on I/O errors or when the header names an unknown algorithm.
    pub fn open(path: &Path) -> Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read> ManifestReader<R> {
    /// Read the algorithm header from `r`.
    pub fn new(r: R) -> Result<Self> {
        let mut inner = BufReader::new(r);
        let mut header = [0u8; HEADER_LEN];
        inner.read_exact(&mut header)?;

        let end = header
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(HEADER_LEN);
        let algorithm = std::str::from_utf8(&header[..end])
            .map_err(|_| Error::Protocol("manifest header is not ASCII".into()))?
            .to_string();
        let width = hash::size_of(&algorithm)?;

        Ok(Self {
            inner,
            algorithm,
            width,
        })
    }

    /// Algorithm named by the header; empty means the default.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Digest width implied by the header.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Decode the next record, or `None` once the sentinel is consumed.
    ///
    /// # Errors
    /// A record that starts but does not complete is a protocol violation.
    pub fn next_record(&mut self) -> Result<Option<FileInfo>> {
        let size = match wire::read_size(&mut self.inner) {
            Ok(size) => size,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if size == 0 {
            return Ok(None);
        }

        let record = (|| -> Result<FileInfo> {
            let global = wire::read_vec(&mut self.inner, self.width)?;
            let local = wire::read_vec(&mut self.inner, self.width)?;
            let path = wire::read_path(&mut self.inner)?;
            Ok(FileInfo {
                size,
                global,
                local,
                path,
            })
        })();
        record
            .map(Some)
            .map_err(|_| Error::Protocol("truncated manifest record".into()))
    }

    /// Decode the trailer. Call after [`ManifestReader::next_record`]
    /// returns `None`.
    pub fn trailer(&mut self) -> Result<Trailer> {
        let trailer = (|| -> io::Result<Trailer> {
            let count = wire::read_u64(&mut self.inner)?;
            let size = wire::read_size(&mut self.inner)?;
            let global = wire::read_vec(&mut self.inner, self.width)?;
            Ok(Trailer {
                count,
                size,
                global,
            })
        })();
        trailer.map_err(|_| Error::Protocol("truncated manifest trailer".into()))
    }
}
