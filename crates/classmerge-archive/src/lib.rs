//! Mergeable content sources, archive entry indexing, and zip output for classmerge.
//!
//! This crate provides the merge layer: the `Mergeable` capability and its
//! `FileMerge`/`JarMerge` implementations, `ArchiveIndex`/`ArchiveIndexCache` for
//! listing archive entries once per build, and the `EntrySink` implementations
//! that write entries into a stored zip container (`ZipSink`) or filter names
//! already written during a build (`DedupSink`).

pub mod file_merge;
pub mod index;
pub mod jar_merge;
pub mod mergeable;
pub mod output;

pub use file_merge::FileMerge;
pub use index::{ArchiveIndex, ArchiveIndexCache};
pub use jar_merge::{JarMerge, JarTarget};
pub use mergeable::{EntryOutcome, EntrySink, Mergeable};
pub use output::{DedupSink, SeenEntries, ZipSink};

use classmerge_schema::LogicalPath;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("cannot read '{}': {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "resource not found on search path: '{path}' (searched {searched} archive(s)); \
         is the dependency that provides it missing from the classpath?"
    )]
    ResourceNotFound { path: LogicalPath, searched: usize },
    #[error("'{target}' not found in archive '{}'", archive.display())]
    EntryNotFoundInArchive { archive: PathBuf, target: String },
    #[error("unsupported source type at '{}': {kind}", path.display())]
    UnsupportedSourceType { path: PathBuf, kind: &'static str },
    #[error("coordinator closed")]
    CoordinatorClosed,
    #[error("failed to write output archive: {0}")]
    OutputWrite(#[source] std::io::Error),
}

/// Discriminant of [`MergeError`], for callers that decide policy per failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeErrorKind {
    SourceUnreadable,
    ResourceNotFound,
    EntryNotFoundInArchive,
    UnsupportedSourceType,
    CoordinatorClosed,
    OutputWrite,
}

impl MergeError {
    pub fn kind(&self) -> MergeErrorKind {
        match self {
            Self::SourceUnreadable { .. } => MergeErrorKind::SourceUnreadable,
            Self::ResourceNotFound { .. } => MergeErrorKind::ResourceNotFound,
            Self::EntryNotFoundInArchive { .. } => MergeErrorKind::EntryNotFoundInArchive,
            Self::UnsupportedSourceType { .. } => MergeErrorKind::UnsupportedSourceType,
            Self::CoordinatorClosed => MergeErrorKind::CoordinatorClosed,
            Self::OutputWrite(_) => MergeErrorKind::OutputWrite,
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            source,
        }
    }
}

/// Flatten a zip error into an I/O error, keeping the original I/O cause when there is one.
pub(crate) fn zip_io(err: zip::result::ZipError) -> std::io::Error {
    match err {
        zip::result::ZipError::Io(e) => e,
        other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
    }
}
