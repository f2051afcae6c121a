use classmerge_archive::{DedupSink, MergeError, Mergeable, SeenEntries, ZipSink};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Entries contributed by one [`MergeCoordinator::write`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub written: usize,
    /// Entries dropped because an earlier write already produced the name.
    pub skipped: usize,
}

/// Result of finalizing an output archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub output: PathBuf,
    pub entries: usize,
    pub skipped: usize,
    /// blake3 of the finished archive.
    pub digest: String,
}

struct OpenOutput {
    sink: ZipSink<BufWriter<NamedTempFile>>,
    seen: SeenEntries,
    skipped: usize,
}

/// Sole owner of one build's output archive.
///
/// Every merge goes through [`write`](Self::write), which runs under a mutex so
/// entries from concurrent callers never interleave, and which skips any entry
/// name already written earlier in the build. The archive is assembled in a
/// temporary file beside the destination and only appears at the destination
/// when [`close`](Self::close) succeeds; dropping an unclosed coordinator
/// discards it.
pub struct MergeCoordinator {
    output: PathBuf,
    state: Mutex<Option<OpenOutput>>,
}

impl MergeCoordinator {
    pub fn create(output: impl Into<PathBuf>) -> Result<Self, MergeError> {
        let output = output.into();
        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(MergeError::OutputWrite)?;
        let tmp = NamedTempFile::new_in(&dir).map_err(MergeError::OutputWrite)?;
        debug!(
            "assembling {} in {}",
            output.display(),
            tmp.path().display()
        );

        Ok(Self {
            output,
            state: Mutex::new(Some(OpenOutput {
                sink: ZipSink::new(BufWriter::new(tmp)),
                seen: SeenEntries::new(),
                skipped: 0,
            })),
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().is_none()
    }

    /// Number of distinct entries written so far.
    pub fn entry_count(&self) -> usize {
        self.state.lock().as_ref().map_or(0, |open| open.seen.len())
    }

    /// Merge `mergeable` into the output, skipping names already present.
    ///
    /// On failure, entries the mergeable wrote before failing stay in the
    /// output; no entry is ever left half-written.
    pub fn write(&self, mergeable: &dyn Mergeable) -> Result<WriteReport, MergeError> {
        let mut state = self.state.lock();
        let open = state.as_mut().ok_or(MergeError::CoordinatorClosed)?;

        let mut dedup = DedupSink::new(&mut open.sink, &mut open.seen);
        let result = mergeable.merge(&mut dedup);
        let report = WriteReport {
            written: dedup.written(),
            skipped: dedup.skipped(),
        };
        open.skipped += report.skipped;
        result?;

        info!(
            "merged {mergeable}: {} written, {} skipped",
            report.written, report.skipped
        );
        Ok(report)
    }

    /// Finalize the archive and move it into place. Later writes fail with
    /// [`MergeError::CoordinatorClosed`].
    pub fn close(&self) -> Result<MergeSummary, MergeError> {
        let open = self
            .state
            .lock()
            .take()
            .ok_or(MergeError::CoordinatorClosed)?;

        let entries = open.seen.len();
        let tmp = open
            .sink
            .finish()?
            .into_inner()
            .map_err(|e| MergeError::OutputWrite(e.into_error()))?;
        tmp.as_file().sync_all().map_err(MergeError::OutputWrite)?;
        tmp.persist(&self.output)
            .map_err(|e| MergeError::OutputWrite(e.error))?;

        let digest = digest_file(&self.output).map_err(MergeError::OutputWrite)?;

        info!(
            "wrote {} ({entries} entries, {} duplicates skipped)",
            self.output.display(),
            open.skipped
        );
        Ok(MergeSummary {
            output: self.output.clone(),
            entries,
            skipped: open.skipped,
            digest,
        })
    }
}

fn digest_file(path: &Path) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut BufReader::new(File::open(path)?), &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use classmerge_archive::{FileMerge, MergeErrorKind};
    use std::fs::File;
    use std::io::Read;

    fn entries(path: &Path) -> Vec<(String, String)> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut f = archive.by_index(i).unwrap();
                let mut s = String::new();
                f.read_to_string(&mut s).unwrap();
                (f.name().to_owned(), s)
            })
            .collect()
    }

    #[test]
    fn duplicate_write_keeps_first_copy() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("Shared.class"), "from a").unwrap();
        fs::write(b.join("Shared.class"), "from b").unwrap();

        let out = dir.path().join("out.jar");
        let coordinator = MergeCoordinator::create(&out).unwrap();
        let first = coordinator.write(&FileMerge::new(&a)).unwrap();
        let second = coordinator.write(&FileMerge::new(&b)).unwrap();
        assert_eq!(first, WriteReport { written: 1, skipped: 0 });
        assert_eq!(second, WriteReport { written: 0, skipped: 1 });

        let summary = coordinator.close().unwrap();
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            entries(&out),
            vec![("Shared.class".to_owned(), "from a".to_owned())]
        );
    }

    #[test]
    fn same_mergeable_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("FileMerge.class");
        fs::write(&file, "x").unwrap();
        let merge = FileMerge::new(&file);

        let out = dir.path().join("out.jar");
        let coordinator = MergeCoordinator::create(&out).unwrap();
        coordinator.write(&merge).unwrap();
        coordinator.write(&merge).unwrap();
        coordinator.close().unwrap();
        assert_eq!(entries(&out).len(), 1);
    }

    #[test]
    fn entry_order_follows_call_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("z.txt"), "z").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let out = dir.path().join("build").join("out.jar");
        let coordinator = MergeCoordinator::create(&out).unwrap();
        coordinator
            .write(&FileMerge::new(dir.path().join("z.txt")))
            .unwrap();
        coordinator
            .write(&FileMerge::new(dir.path().join("a.txt")))
            .unwrap();
        coordinator.close().unwrap();
        let names: Vec<_> = entries(&out).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z.txt", "a.txt"]);
    }

    #[test]
    fn write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = MergeCoordinator::create(dir.path().join("out.jar")).unwrap();
        coordinator.close().unwrap();
        assert!(coordinator.is_closed());
        let err = coordinator
            .write(&FileMerge::new(dir.path()))
            .unwrap_err();
        assert_eq!(err.kind(), MergeErrorKind::CoordinatorClosed);
        assert_eq!(
            coordinator.close().unwrap_err().kind(),
            MergeErrorKind::CoordinatorClosed
        );
    }

    #[test]
    fn failed_write_is_reported_and_build_continues() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ok.txt"), "ok").unwrap();
        let coordinator = MergeCoordinator::create(dir.path().join("out.jar")).unwrap();
        let err = coordinator
            .write(&FileMerge::new(dir.path().join("missing.txt")))
            .unwrap_err();
        assert_eq!(err.kind(), MergeErrorKind::SourceUnreadable);
        coordinator
            .write(&FileMerge::new(dir.path().join("ok.txt")))
            .unwrap();
        assert_eq!(coordinator.entry_count(), 1);
        coordinator.close().unwrap();
    }

    #[test]
    fn unclosed_coordinator_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ok.txt"), "ok").unwrap();
        let out = dir.path().join("out.jar");
        {
            let coordinator = MergeCoordinator::create(&out).unwrap();
            coordinator
                .write(&FileMerge::new(dir.path().join("ok.txt")))
                .unwrap();
        }
        assert!(!out.exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name() != "ok.txt")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn concurrent_writers_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..16 {
            fs::write(dir.path().join(format!("f{i:02}.txt")), format!("{i}")).unwrap();
        }
        let out = dir.path().join("build").join("out.jar");
        let coordinator = MergeCoordinator::create(&out).unwrap();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for i in 0..16 {
                        let path = dir.path().join(format!("f{i:02}.txt"));
                        coordinator.write(&FileMerge::new(path)).unwrap();
                    }
                });
            }
        });
        let summary = coordinator.close().unwrap();
        assert_eq!(summary.entries, 16);
        assert_eq!(summary.skipped, 48);
        assert_eq!(entries(&out).len(), 16);
    }

    #[test]
    fn summary_digest_matches_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.txt"), "x").unwrap();
        let out = dir.path().join("out.jar");
        let coordinator = MergeCoordinator::create(&out).unwrap();
        coordinator
            .write(&FileMerge::new(dir.path().join("x.txt")))
            .unwrap();
        let summary = coordinator.close().unwrap();
        let expected = blake3::hash(&fs::read(&out).unwrap()).to_hex().to_string();
        assert_eq!(summary.digest, expected);
    }
}
