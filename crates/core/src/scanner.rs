//! Scanner: drives the file stream through the dual digest, emitting
//! manifest records or remote requests.

use std::io::Write;
use std::path::Path;

use crate::digest::Digest;
use crate::entry::{self, Coze, Entry};
use crate::error::Result;
use crate::manifest::ManifestWriter;

/// Remote side of a scan session.
///
/// Implemented by the TCP client; tests swap in an in-process fake. Entry
/// paths handed to a peer are base-relative, `source` is the absolute path
/// to read bytes from.
pub trait Peer {
    /// Ask the peer to verify existence, size and digest of a file.
    fn check(&mut self, entry: &Entry, digest: &[u8]) -> Result<()>;

    /// Send the file's bytes to the peer.
    fn copy(&mut self, source: &Path, entry: &Entry, digest: &[u8]) -> Result<()>;

    /// Ask the peer to confirm aggregate counters and the session digest.
    fn compare(&mut self, cz: &Coze, digest: &[u8]) -> Result<()>;
}

/// Walks a base directory, hashing every file into a [`Digest`] and
/// optionally recording a manifest.
pub struct Scanner {
    digest: Digest,
    sink: Option<ManifestWriter<Box<dyn Write + Send>>>,
}

impl Scanner {
    /// Scanner without a manifest sink.
    pub fn new(algorithm: &str) -> Result<Self> {
        Ok(Self {
            digest: Digest::new(algorithm)?,
            sink: None,
        })
    }

    /// Scanner that records a manifest; the algorithm header is written
    /// immediately.
    pub fn with_manifest(algorithm: &str, sink: impl Write + Send + 'static) -> Result<Self> {
        let digest = Digest::new(algorithm)?;
        let writer = ManifestWriter::new(Box::new(sink) as Box<dyn Write + Send>, algorithm)?;
        Ok(Self {
            digest,
            sink: Some(writer),
        })
    }

    /// Snapshot of the session digest.
    #[must_use]
    pub fn checksum(&self) -> Vec<u8> {
        self.digest.global()
    }

    /// Hash every file under `base`, record manifest entries, and write the
    /// trailer. `seen` observes each finished entry with its local digest.
    pub fn scan<F>(&mut self, base: &Path, pattern: Option<&str>, mut seen: F) -> Result<Coze>
    where
        F: FnMut(&Entry, &[u8]),
    {
        let mut cz = Coze::default();
        for entry in entry::files(base, pattern)? {
            entry.compute(&mut self.digest)?;
            if let Some(sink) = self.sink.as_mut() {
                let rel = base_relative(base, &entry);
                sink.record(
                    entry.size,
                    &self.digest.global(),
                    &self.digest.local(),
                    &rel,
                )?;
            }
            seen(&entry, &self.digest.local());
            cz.update(entry.size);
            self.digest.reset();
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.finish(&cz, &self.digest.global())?;
        }
        Ok(cz)
    }

    /// Copy every file to the peer, then confirm aggregates.
    pub fn transfer<P, F>(
        &mut self,
        client: &mut P,
        base: &Path,
        pattern: Option<&str>,
        mut seen: F,
    ) -> Result<Coze>
    where
        P: Peer + ?Sized,
        F: FnMut(&Entry, &[u8]),
    {
        let mut cz = Coze::default();
        for entry in entry::files(base, pattern)? {
            entry.compute(&mut self.digest)?;
            let rel = Entry {
                path: base_relative(base, &entry).into(),
                size: entry.size,
            };
            let local = self.digest.local();
            client.copy(&entry.path, &rel, &local)?;
            seen(&rel, &local);
            cz.update(entry.size);
            self.digest.reset();
        }
        client.compare(&cz, &self.digest.global())?;
        Ok(cz)
    }

    /// Ask the peer to CHECK every file; when `sync` is set, recoverable
    /// failures (missing file, size or digest drift) fall back to a COPY.
    /// Aggregates are confirmed at the end.
    pub fn synchronize<P, F>(
        &mut self,
        client: &mut P,
        base: &Path,
        pattern: Option<&str>,
        sync: bool,
        mut seen: F,
    ) -> Result<Coze>
    where
        P: Peer + ?Sized,
        F: FnMut(&Entry, &[u8]),
    {
        let mut cz = Coze::default();
        for entry in entry::files(base, pattern)? {
            entry.compute(&mut self.digest)?;
            let rel = Entry {
                path: base_relative(base, &entry).into(),
                size: entry.size,
            };
            let local = self.digest.local();

            let mut outcome = client.check(&rel, &local);
            if sync && outcome.as_ref().is_err_and(|e| e.is_recoverable()) {
                outcome = client.copy(&entry.path, &rel, &local);
            }
            outcome?;

            seen(&rel, &local);
            cz.update(entry.size);
            self.digest.reset();
        }
        client.compare(&cz, &self.digest.global())?;
        Ok(cz)
    }
}

fn base_relative(base: &Path, entry: &Entry) -> String {
    entry
        .path
        .strip_prefix(base)
        .unwrap_or(&entry.path)
        .to_string_lossy()
        .into_owned()
}
