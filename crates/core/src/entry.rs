//! File discovery: the ordered entry stream and the session counters.
//!
//! A producer thread walks (or globs) the base directory and hands entries
//! through a bounded channel, so the walker cannot outrun the hasher. The
//! stream is finite, ordered, and single-pass; consumers drain it fully.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use ignore::WalkBuilder;

use crate::error::{Error, Result};

/// Entries queued between the walker thread and the consumer.
const QUEUE_DEPTH: usize = 128;

/// A regular file to process, as discovered by the walker.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: PathBuf,
    pub size: u64,
}

impl Entry {
    /// Stream the file's bytes into `w`.
    ///
    /// # Errors
    /// Returns [`Error::SizeMismatch`] when the copied byte count differs
    /// from the recorded size, or the underlying I/O error.
    pub fn compute<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut file = File::open(&self.path)?;
        let copied = io::copy(&mut file, w)?;
        if copied != self.size {
            return Err(Error::SizeMismatch {
                path: self.path.display().to_string(),
                want: self.size,
                got: copied,
            });
        }
        Ok(())
    }
}

/// Manifest and wire paths are base-relative but may begin with a path
/// separator (a compatibility artifact); trim it before joining.
#[must_use]
pub fn relative(raw: &str) -> &Path {
    Path::new(raw.trim_start_matches(['/', '\\']))
}

/// Ordered, finite, non-restartable stream of entries.
pub struct FileStream {
    rx: Receiver<Entry>,
}

impl Iterator for FileStream {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        self.rx.recv().ok()
    }
}

/// Discover regular files of positive size under `base`.
///
/// Without a pattern the base is walked depth-first in sorted order and
/// per-entry traversal errors are skipped silently; with a pattern, matches
/// of `base`-joined `pattern` are kept instead.
///
/// # Errors
/// Returns [`Error::InvalidPattern`] when the glob pattern does not parse.
pub fn files(base: &Path, pattern: Option<&str>) -> Result<FileStream> {
    match pattern {
        None | Some("") => Ok(walk_files(base)),
        Some(pattern) => glob_files(base, pattern),
    }
}

fn walk_files(base: &Path) -> FileStream {
    let (tx, rx) = mpsc::sync_channel(QUEUE_DEPTH);
    let walk = WalkBuilder::new(base)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    thread::spawn(move || {
        for dent in walk.flatten() {
            let Ok(meta) = dent.metadata() else { continue };
            if !meta.is_file() || meta.len() == 0 {
                continue;
            }
            let entry = Entry {
                size: meta.len(),
                path: dent.into_path(),
            };
            if tx.send(entry).is_err() {
                return;
            }
        }
    });

    FileStream { rx }
}

fn glob_files(base: &Path, pattern: &str) -> Result<FileStream> {
    let full = base.join(pattern);
    let matches = glob::glob(&full.to_string_lossy())
        .map_err(|e| Error::InvalidPattern(e.to_string()))?;

    let (tx, rx) = mpsc::sync_channel(QUEUE_DEPTH);
    thread::spawn(move || {
        for path in matches.flatten() {
            let Ok(meta) = std::fs::metadata(&path) else {
                continue;
            };
            if !meta.is_file() || meta.len() == 0 {
                continue;
            }
            let entry = Entry {
                path,
                size: meta.len(),
            };
            if tx.send(entry).is_err() {
                return;
            }
        }
    });

    Ok(FileStream { rx })
}

/// Running totals over one session.
///
/// Aggregate equality is count + total size only; min and max are
/// observational.
#[derive(Debug, Default, Clone, Copy)]
pub struct Coze {
    pub count: u64,
    pub size: u64,
    pub min: u64,
    pub max: u64,
}

impl Coze {
    /// Fold one file size into the totals. Zero sizes are ignored.
    pub fn update(&mut self, size: u64) {
        if size == 0 {
            return;
        }
        if self.count == 0 || self.min > size {
            self.min = size;
        }
        if self.count == 0 || self.max < size {
            self.max = size;
        }
        self.count += 1;
        self.size += size;
    }

    /// Aggregate agreement: count and total size.
    #[must_use]
    pub fn matches(&self, other: &Coze) -> bool {
        self.count == other.count && self.size == other.size
    }

    /// Mean file size, zero when empty.
    #[must_use]
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.size as f64 / self.count as f64
    }

    /// Smallest and largest observed file size.
    #[must_use]
    pub fn range(&self) -> (u64, u64) {
        (self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_walk_yields_sorted_regular_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.txt"), "world").unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::write(dir.path().join("sub/c.txt"), "!").unwrap();

        let entries: Vec<Entry> = files(dir.path(), None).unwrap().collect();
        let names: Vec<String> = entries
            .iter()
            .map(|e| {
                e.path
                    .strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();

        assert_eq!(names, ["a.txt", "b.txt", "sub/c.txt"]);
        assert_eq!(entries[0].size, 5);
    }

    #[test]
    fn test_walk_skips_empty_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("full.bin"), "data").unwrap();
        fs::write(dir.path().join("empty.bin"), "").unwrap();

        let entries: Vec<Entry> = files(dir.path(), None).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].path.ends_with("full.bin"));
    }

    #[test]
    fn test_walk_of_empty_base_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(files(dir.path(), None).unwrap().count(), 0);
    }

    #[test]
    fn test_glob_filters_by_pattern() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.log"), "aaa").unwrap();
        fs::write(dir.path().join("skip.txt"), "bbb").unwrap();

        let entries: Vec<Entry> = files(dir.path(), Some("*.log")).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].path.ends_with("keep.log"));
    }

    #[test]
    fn test_bad_glob_pattern_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            files(dir.path(), Some("a[")),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_compute_detects_size_drift() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.bin");
        fs::write(&path, "12345").unwrap();

        let entry = Entry {
            path,
            size: 9,
        };
        let mut sink = io::sink();
        assert!(matches!(
            entry.compute(&mut sink),
            Err(Error::SizeMismatch { want: 9, got: 5, .. })
        ));
    }

    #[test]
    fn test_relative_trims_leading_separator() {
        assert_eq!(relative("/sub/a.bin"), Path::new("sub/a.bin"));
        assert_eq!(relative("sub/a.bin"), Path::new("sub/a.bin"));
    }

    #[test]
    fn test_coze_ignores_zero_and_tracks_range() {
        let mut cz = Coze::default();
        cz.update(0);
        assert_eq!(cz.count, 0);

        cz.update(10);
        cz.update(2);
        cz.update(30);

        assert_eq!(cz.count, 3);
        assert_eq!(cz.size, 42);
        assert_eq!(cz.range(), (2, 30));
        assert!((cz.avg() - 14.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coze_equality_is_count_and_size_only() {
        let mut a = Coze::default();
        let mut b = Coze::default();
        a.update(5);
        a.update(10);
        b.update(10);
        b.update(5);
        assert!(a.matches(&b));

        b.update(1);
        assert!(!a.matches(&b));
    }
}
