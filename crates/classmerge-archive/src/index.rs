use crate::{zip_io, MergeError};
use classmerge_schema::EntryName;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Entry listing of one archive, in the archive's own enumeration order.
///
/// Lookups only see file entries, matching what a merge can copy out of the
/// archive; [`entries`](Self::entries) still lists directory entries.
#[derive(Debug)]
pub struct ArchiveIndex {
    path: PathBuf,
    entries: Vec<EntryName>,
    files: BTreeSet<String>,
}

impl ArchiveIndex {
    /// Open the archive, read its central directory, and close it again.
    pub fn scan(path: &Path) -> Result<Self, MergeError> {
        let file = File::open(path).map_err(|e| MergeError::unreadable(path, e))?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file))
            .map_err(|e| MergeError::unreadable(path, zip_io(e)))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .map_err(|e| MergeError::unreadable(path, zip_io(e)))?;
            entries.push(EntryName::new(entry.name()));
        }
        let files = entries
            .iter()
            .filter(|e| !e.is_dir())
            .map(|e| e.as_str().to_owned())
            .collect();

        debug!("indexed {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            files,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[EntryName] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when `name` is a file entry of the archive.
    pub fn contains_entry(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    /// True when at least one file entry name starts with `prefix`.
    ///
    /// The comparison is textual: `abc` also matches `abcdef`.
    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.files
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .next()
            .is_some_and(|name| name.starts_with(prefix))
    }
}

type Slot = Arc<Mutex<Option<Arc<ArchiveIndex>>>>;

/// Build-scoped cache of archive listings, keyed by archive location.
///
/// Each archive is scanned at most once, even when several threads ask for it
/// at the same time: callers for the same archive wait on a per-archive slot
/// while one of them scans. A failed scan leaves the slot empty so the error
/// is reported to every caller that asks.
#[derive(Debug, Default)]
pub struct ArchiveIndexCache {
    slots: Mutex<HashMap<PathBuf, Slot>>,
    scans: AtomicUsize,
}

impl ArchiveIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, archive: &Path) -> Result<Arc<ArchiveIndex>, MergeError> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(archive.to_path_buf()).or_default())
        };

        let mut cached = slot.lock();
        if let Some(index) = cached.as_ref() {
            return Ok(Arc::clone(index));
        }

        let index = Arc::new(ArchiveIndex::scan(archive)?);
        self.scans.fetch_add(1, Ordering::Relaxed);
        *cached = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Number of archive listings read from disk so far.
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}
