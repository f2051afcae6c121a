//! Classpath resolution and merge coordination for classmerge.
//!
//! This crate ties the schema and archive layers together: `ClasspathResolver`
//! decides whether a logical path is served from the filesystem or from an
//! archive on the search path, `MergeCoordinator` owns a build's output archive
//! and enforces entry-name deduplication, and `BuildSession` scopes both to a
//! single build run from a manifest.

pub mod concurrency;
pub mod coordinator;
pub mod resolver;
pub mod session;

pub use concurrency::OutputLock;
pub use coordinator::{MergeCoordinator, MergeSummary, WriteReport};
pub use resolver::{ClasspathResolver, Resolved};
pub use session::{build_from_manifest, BuildReport, BuildSession, FailedPath, MergedPath};

use classmerge_schema::LogicalPath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] classmerge_schema::ManifestError),
    #[error("merge error: {0}")]
    Merge(#[from] classmerge_archive::MergeError),
    #[error("merge of '{path}' failed: {source}")]
    PathFailed {
        path: LogicalPath,
        #[source]
        source: classmerge_archive::MergeError,
    },
    #[error("output lock failed: {0}")]
    LockFailed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// The underlying merge failure, if this error carries one.
    pub fn merge_error(&self) -> Option<&classmerge_archive::MergeError> {
        match self {
            Self::Merge(e) | Self::PathFailed { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classmerge_archive::{MergeError, MergeErrorKind};

    #[test]
    fn path_failed_names_the_path() {
        let e = CoreError::PathFailed {
            path: LogicalPath::new("org/x/Y.class"),
            source: MergeError::CoordinatorClosed,
        };
        let msg = e.to_string();
        assert!(msg.contains("org/x/Y.class"));
        assert!(msg.contains("coordinator closed"));
        assert_eq!(
            e.merge_error().map(MergeError::kind),
            Some(MergeErrorKind::CoordinatorClosed)
        );
    }

    #[test]
    fn lock_failed_has_no_merge_error() {
        let e = CoreError::LockFailed("busy".to_owned());
        assert!(e.merge_error().is_none());
        assert!(e.to_string().contains("busy"));
    }
}
