//! Comparer: re-reads a manifest and verifies the named files under one or
//! more candidate directories.

use std::fs;
use std::path::{Path, PathBuf};

use crate::digest::Digest;
use crate::entry::{self, Coze, Entry};
use crate::error::{Error, Result};
use crate::manifest::{FileInfo, ManifestReader};

/// Verifies manifest records against candidate directories.
///
/// The first candidate directory containing a record's file wins; later
/// ones are not consulted for that record. A record missing under every
/// candidate ends the walk without its own error; the trailer check then
/// reports the aggregate disagreement.
pub struct Comparer {
    digest: Digest,
    reader: ManifestReader<fs::File>,
}

impl Comparer {
    /// Open a manifest and build the digest its header names.
    pub fn open(manifest: &Path) -> Result<Self> {
        let reader = ManifestReader::open(manifest)?;
        let digest = Digest::new(reader.algorithm())?;
        Ok(Self { digest, reader })
    }

    /// Algorithm named by the manifest header.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        self.reader.algorithm()
    }

    /// Snapshot of the recomputed session digest.
    #[must_use]
    pub fn checksum(&self) -> Vec<u8> {
        self.digest.global()
    }

    /// Re-hash every recorded file and verify size, per-file digest, and
    /// the running session digest, then the trailer aggregates.
    pub fn compare<F>(&mut self, dirs: &[PathBuf], mut seen: F) -> Result<Coze>
    where
        F: FnMut(&FileInfo, &Path),
    {
        let mut cz = Coze::default();
        while let Some(info) = self.reader.next_record()? {
            let Some(path) = locate(&info, dirs) else {
                self.drain()?;
                break;
            };
            self.verify(&path, &info)?;
            seen(&info, &path);
            cz.update(info.size);
            self.digest.reset();
        }
        self.finish(cz, true)
    }

    /// Presence and size verification only; file bytes are not read, so the
    /// trailer digest cannot be checked.
    pub fn list<F>(&mut self, dirs: &[PathBuf], mut seen: F) -> Result<Coze>
    where
        F: FnMut(&FileInfo, &Path),
    {
        let mut cz = Coze::default();
        while let Some(info) = self.reader.next_record()? {
            let Some(path) = locate(&info, dirs) else {
                self.drain()?;
                break;
            };
            let meta = fs::metadata(&path)?;
            if meta.len() != info.size {
                return Err(Error::SizeMismatch {
                    path: path.display().to_string(),
                    want: info.size,
                    got: meta.len(),
                });
            }
            seen(&info, &path);
            cz.update(info.size);
        }
        self.finish(cz, false)
    }

    fn verify(&mut self, path: &Path, info: &FileInfo) -> Result<()> {
        let entry = Entry {
            path: path.to_path_buf(),
            size: info.size,
        };
        entry.compute(&mut self.digest)?;

        let local = self.digest.local();
        if local != info.local {
            return Err(Error::ChecksumMismatch {
                path: path.display().to_string(),
                want: info.local.clone(),
                got: local,
            });
        }
        let global = self.digest.global();
        if global != info.global {
            return Err(Error::ChecksumMismatch {
                path: path.display().to_string(),
                want: info.global.clone(),
                got: global,
            });
        }
        Ok(())
    }

    // Skip the remaining records so the trailer is read from the right
    // offset after an early stop.
    fn drain(&mut self) -> Result<()> {
        while self.reader.next_record()?.is_some() {}
        Ok(())
    }

    fn finish(&mut self, cz: Coze, check_digest: bool) -> Result<Coze> {
        let trailer = self.reader.trailer()?;
        if cz.count != trailer.count || cz.size != trailer.size {
            return Err(Error::AggregateMismatch(format!(
                "count/size {}/{} != {}/{}",
                trailer.count, trailer.size, cz.count, cz.size
            )));
        }
        if check_digest {
            let got = self.digest.global();
            if got != trailer.global {
                return Err(Error::AggregateMismatch(format!(
                    "checksum {} != {}",
                    hex::encode(&trailer.global),
                    hex::encode(&got)
                )));
            }
        }
        Ok(cz)
    }
}

fn locate(info: &FileInfo, dirs: &[PathBuf]) -> Option<PathBuf> {
    let rel = entry::relative(&info.path);
    dirs.iter().map(|dir| dir.join(rel)).find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Coze as Counters;
    use crate::manifest::ManifestWriter;
    use crate::scanner::Scanner;
    use tempfile::TempDir;

    struct Fixture {
        data: TempDir,
        _keep: TempDir,
        manifest: PathBuf,
    }

    fn scanned_dir() -> Fixture {
        let data = TempDir::new().unwrap();
        fs::create_dir(data.path().join("sub")).unwrap();
        fs::write(data.path().join("a.bin"), "hello").unwrap();
        fs::write(data.path().join("sub/b.bin"), "world").unwrap();

        let keep = TempDir::new().unwrap();
        let manifest = keep.path().join("list.sum");
        let mut scanner =
            Scanner::with_manifest("md5", fs::File::create(&manifest).unwrap()).unwrap();
        scanner.scan(data.path(), None, |_, _| {}).unwrap();

        Fixture {
            data,
            _keep: keep,
            manifest,
        }
    }

    #[test]
    fn test_compare_accepts_the_scanned_tree() {
        let fx = scanned_dir();
        let mut comparer = Comparer::open(&fx.manifest).unwrap();
        let cz = comparer
            .compare(&[fx.data.path().to_path_buf()], |_, _| {})
            .unwrap();

        assert_eq!(cz.count, 2);
        assert_eq!(cz.size, 10);
        assert_eq!(
            hex::encode(comparer.checksum()),
            "fc5e038d38a57032085441e7fe7010b0"
        );
    }

    #[test]
    fn test_compare_rejects_tampered_content() {
        let fx = scanned_dir();
        fs::write(fx.data.path().join("sub/b.bin"), "WORLD").unwrap();

        let mut comparer = Comparer::open(&fx.manifest).unwrap();
        let err = comparer
            .compare(&[fx.data.path().to_path_buf()], |_, _| {})
            .unwrap_err();
        match err {
            Error::ChecksumMismatch { path, .. } => assert!(path.ends_with("b.bin")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_stops_cleanly_and_fails_aggregates() {
        let fx = scanned_dir();
        fs::remove_file(fx.data.path().join("a.bin")).unwrap();

        let mut comparer = Comparer::open(&fx.manifest).unwrap();
        let err = comparer
            .compare(&[fx.data.path().to_path_buf()], |_, _| {})
            .unwrap_err();
        assert!(matches!(err, Error::AggregateMismatch(_)));
    }

    #[test]
    fn test_first_candidate_directory_wins() {
        let fx = scanned_dir();

        // A decoy tree with diverging content for the same relative paths.
        let decoy = TempDir::new().unwrap();
        fs::create_dir(decoy.path().join("sub")).unwrap();
        fs::write(decoy.path().join("a.bin"), "XXXXX").unwrap();
        fs::write(decoy.path().join("sub/b.bin"), "YYYYY").unwrap();

        let mut comparer = Comparer::open(&fx.manifest).unwrap();
        let cz = comparer
            .compare(
                &[fx.data.path().to_path_buf(), decoy.path().to_path_buf()],
                |_, _| {},
            )
            .unwrap();
        assert_eq!(cz.count, 2);

        // Reversed order verifies against the decoy first and fails.
        let mut comparer = Comparer::open(&fx.manifest).unwrap();
        assert!(comparer
            .compare(
                &[decoy.path().to_path_buf(), fx.data.path().to_path_buf()],
                |_, _| {},
            )
            .is_err());
    }

    #[test]
    fn test_corrupted_trailer_count_is_an_aggregate_mismatch() {
        let data = TempDir::new().unwrap();
        fs::write(data.path().join("a.bin"), "hello").unwrap();

        // Scan by hand so the trailer can lie about the count.
        let manifest = data.path().join("list.sum");
        let mut digest = Digest::new("md5").unwrap();
        let mut writer =
            ManifestWriter::new(fs::File::create(&manifest).unwrap(), "md5").unwrap();
        let entry = Entry {
            path: data.path().join("a.bin"),
            size: 5,
        };
        entry.compute(&mut digest).unwrap();
        writer
            .record(5, &digest.global(), &digest.local(), "a.bin")
            .unwrap();
        let mut lying = Counters::default();
        lying.update(5);
        lying.count = 3;
        writer.finish(&lying, &digest.global()).unwrap();
        drop(writer);

        let mut comparer = Comparer::open(&manifest).unwrap();
        let err = comparer
            .compare(&[data.path().to_path_buf()], |_, _| {})
            .unwrap_err();
        assert!(matches!(err, Error::AggregateMismatch(_)));
    }

    #[test]
    fn test_list_checks_presence_and_size_only() {
        let fx = scanned_dir();
        // Same size, different bytes: list accepts what compare rejects.
        fs::write(fx.data.path().join("sub/b.bin"), "WORLD").unwrap();

        let mut comparer = Comparer::open(&fx.manifest).unwrap();
        let cz = comparer
            .list(&[fx.data.path().to_path_buf()], |_, _| {})
            .unwrap();
        assert_eq!(cz.count, 2);

        fs::write(fx.data.path().join("sub/b.bin"), "worlds apart").unwrap();
        let mut comparer = Comparer::open(&fx.manifest).unwrap();
        assert!(matches!(
            comparer.list(&[fx.data.path().to_path_buf()], |_, _| {}),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
