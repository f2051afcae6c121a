use crate::mergeable::{EntrySink, Mergeable};
use crate::{zip_io, MergeError};
use classmerge_schema::{EntryName, LogicalPath};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::info;

const MAX_PREALLOC: u64 = 1 << 20;

/// What a [`JarMerge`] copies out of its archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JarTarget {
    /// Exactly one entry.
    Entry(EntryName),
    /// Every file entry whose name starts with the prefix.
    ///
    /// Matching is plain string comparison: `abc` also matches `abcdef`.
    /// Callers that mean a package must pass a prefix ending in `/`.
    Prefix(LogicalPath),
}

impl JarTarget {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Entry(entry) => entry.as_str() == name,
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for JarTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry(entry) => f.write_str(entry),
            Self::Prefix(prefix) => f.write_str(prefix),
        }
    }
}

/// Copies entries out of one archive, keeping their original entry names.
///
/// Matching entries are written in the archive's own enumeration order.
/// Directory entries are never copied. A target that matches no file entry
/// fails with [`MergeError::EntryNotFoundInArchive`] before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarMerge {
    archive: PathBuf,
    target: JarTarget,
}

impl JarMerge {
    pub fn new(archive: impl Into<PathBuf>, target: JarTarget) -> Self {
        Self {
            archive: archive.into(),
            target,
        }
    }

    pub fn entry(archive: impl Into<PathBuf>, name: impl Into<EntryName>) -> Self {
        Self::new(archive, JarTarget::Entry(name.into()))
    }

    pub fn prefix(archive: impl Into<PathBuf>, prefix: impl Into<LogicalPath>) -> Self {
        Self::new(archive, JarTarget::Prefix(prefix.into()))
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn target(&self) -> &JarTarget {
        &self.target
    }
}

impl Mergeable for JarMerge {
    fn merge(&self, sink: &mut dyn EntrySink) -> Result<(), MergeError> {
        let unreadable = |e| MergeError::unreadable(&self.archive, e);

        let file = File::open(&self.archive).map_err(unreadable)?;
        let mut archive =
            zip::ZipArchive::new(BufReader::new(file)).map_err(|e| unreadable(zip_io(e)))?;

        let mut matched = Vec::new();
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| unreadable(zip_io(e)))?;
            if !entry.is_dir() && self.target.matches(entry.name()) {
                matched.push((i, EntryName::new(entry.name())));
            }
        }

        if matched.is_empty() {
            return Err(MergeError::EntryNotFoundInArchive {
                archive: self.archive.clone(),
                target: self.target.to_string(),
            });
        }

        info!(
            "merging {} entr{} for '{}' from {}",
            matched.len(),
            if matched.len() == 1 { "y" } else { "ies" },
            self.target,
            self.archive.display()
        );
        for (i, name) in &matched {
            let mut entry = archive.by_index(*i).map_err(|e| unreadable(zip_io(e)))?;
            // Header sizes are untrusted; cap the preallocation.
            let mut data = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
            entry.read_to_end(&mut data).map_err(unreadable)?;
            drop(entry);
            sink.put_entry(name, &data)?;
        }
        Ok(())
    }
}

impl fmt::Display for JarMerge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.target, self.archive.display())
    }
}
