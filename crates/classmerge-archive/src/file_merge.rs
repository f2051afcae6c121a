use crate::mergeable::{EntrySink, Mergeable};
use crate::MergeError;
use classmerge_schema::{EntryName, LogicalPath, SEPARATOR};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, FileType, Metadata};
use std::path::{Path, PathBuf};
use tracing::info;

/// Merges a single file, or every file below a directory, from the filesystem.
///
/// A single file is written under its own file name. A directory is walked in
/// lexical order at every level, and each file is written under its path
/// relative to the directory, with `/` separators. Directories themselves get
/// no entries.
///
/// [`at`](Self::at) anchors the entries at a logical location instead: a file
/// is written under the destination itself, and a directory's files under the
/// destination used as a prefix.
///
/// Anything that is neither a regular file nor a directory is rejected with
/// [`MergeError::UnsupportedSourceType`]. Symlinks are rejected too unless
/// [`follow_links`](Self::follow_links) is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMerge {
    path: PathBuf,
    destination: Option<LogicalPath>,
    follow_links: bool,
}

impl FileMerge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            destination: None,
            follow_links: false,
        }
    }

    #[must_use]
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Write entries under `destination` rather than relative to the source.
    #[must_use]
    pub fn at(mut self, destination: impl Into<LogicalPath>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn destination(&self) -> Option<&LogicalPath> {
        self.destination.as_ref()
    }

    fn metadata(&self, path: &Path) -> Result<Metadata, MergeError> {
        let meta = if self.follow_links {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        };
        meta.map_err(|e| MergeError::unreadable(path, e))
    }

    /// Recursively collect (entry_name, full_path) pairs below `current`.
    fn collect_files(
        &self,
        current: &Path,
        prefix: &str,
        visited: &mut HashSet<PathBuf>,
        out: &mut Vec<(EntryName, PathBuf)>,
    ) -> Result<(), MergeError> {
        if self.follow_links {
            // A link back to an ancestor would otherwise recurse forever.
            let canonical =
                fs::canonicalize(current).map_err(|e| MergeError::unreadable(current, e))?;
            if !visited.insert(canonical) {
                return Ok(());
            }
        }

        let mut children = Vec::new();
        for entry in fs::read_dir(current).map_err(|e| MergeError::unreadable(current, e))? {
            let entry = entry.map_err(|e| MergeError::unreadable(current, e))?;
            children.push(entry.path());
        }
        children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        for child in children {
            let name = child
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let meta = self.metadata(&child)?;
            if meta.is_file() {
                out.push((EntryName::new(format!("{prefix}{name}")), child));
            } else if meta.is_dir() {
                let nested = format!("{prefix}{name}{SEPARATOR}");
                self.collect_files(&child, &nested, visited, out)?;
            } else {
                return Err(MergeError::UnsupportedSourceType {
                    path: child,
                    kind: describe_file_type(meta.file_type()),
                });
            }
        }
        Ok(())
    }
}

impl Mergeable for FileMerge {
    fn merge(&self, sink: &mut dyn EntrySink) -> Result<(), MergeError> {
        let meta = self.metadata(&self.path)?;

        let files = if meta.is_file() {
            let name = match &self.destination {
                Some(dest) => dest.as_str().to_owned(),
                None => self
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            vec![(EntryName::new(name), self.path.clone())]
        } else if meta.is_dir() {
            let prefix = self
                .destination
                .as_ref()
                .map(|dest| dest.as_prefix().into_inner())
                .unwrap_or_default();
            let mut files = Vec::new();
            self.collect_files(&self.path, &prefix, &mut HashSet::new(), &mut files)?;
            files
        } else {
            return Err(MergeError::UnsupportedSourceType {
                path: self.path.clone(),
                kind: describe_file_type(meta.file_type()),
            });
        };

        info!("merging {} file(s) from {}", files.len(), self.path.display());
        for (name, full_path) in &files {
            let data = fs::read(full_path).map_err(|e| MergeError::unreadable(full_path, e))?;
            sink.put_entry(name, &data)?;
        }
        Ok(())
    }
}

impl fmt::Display for FileMerge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {}", self.path.display())
    }
}

#[cfg(unix)]
fn describe_file_type(ft: FileType) -> &'static str {
    use std::os::unix::fs::FileTypeExt;
    if ft.is_symlink() {
        "symlink"
    } else if ft.is_fifo() {
        "fifo"
    } else if ft.is_socket() {
        "socket"
    } else if ft.is_block_device() {
        "block device"
    } else if ft.is_char_device() {
        "character device"
    } else {
        "unknown file type"
    }
}

#[cfg(not(unix))]
fn describe_file_type(ft: FileType) -> &'static str {
    if ft.is_symlink() {
        "symlink"
    } else {
        "unknown file type"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mergeable::tests::MemorySink;
    use crate::output::ZipSink;
    use crate::testutil::entry_names;
    use crate::MergeErrorKind;

    fn create_fixture_dir(dir: &Path) {
        fs::write(dir.join("FileMerge.class"), "file merge").unwrap();
        fs::write(dir.join("MergeManager.class"), "merge manager").unwrap();
        fs::create_dir_all(dir.join("nested").join("deeper")).unwrap();
        fs::write(dir.join("nested").join("Inner.class"), "inner").unwrap();
        fs::write(dir.join("nested").join("deeper").join("Deep.class"), "deep").unwrap();
        fs::create_dir_all(dir.join("empty_dir")).unwrap();
    }

    #[test]
    fn single_file_uses_base_name() {
        let dir = tempfile::tempdir().unwrap();
        create_fixture_dir(dir.path());
        let mut sink = MemorySink::default();
        FileMerge::new(dir.path().join("nested").join("Inner.class"))
            .merge(&mut sink)
            .unwrap();
        assert_eq!(sink.names(), vec!["Inner.class"]);
        assert_eq!(sink.entries[0].1, b"inner");
    }

    #[test]
    fn single_file_into_zip_has_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        create_fixture_dir(dir.path());
        let out = dir.path().join("out.zip");
        let mut sink = ZipSink::new(fs::File::create(&out).unwrap());
        FileMerge::new(dir.path().join("FileMerge.class"))
            .merge(&mut sink)
            .unwrap();
        sink.finish().unwrap();
        assert_eq!(entry_names(&out), vec!["FileMerge.class"]);
    }

    #[test]
    fn directory_entries_are_relative_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        create_fixture_dir(dir.path());
        let mut sink = MemorySink::default();
        FileMerge::new(dir.path()).merge(&mut sink).unwrap();
        assert_eq!(
            sink.names(),
            vec![
                "FileMerge.class",
                "MergeManager.class",
                "nested/Inner.class",
                "nested/deeper/Deep.class",
            ]
        );
    }

    #[test]
    fn destination_anchors_single_file() {
        let dir = tempfile::tempdir().unwrap();
        create_fixture_dir(dir.path());
        let mut sink = MemorySink::default();
        FileMerge::new(dir.path().join("nested").join("Inner.class"))
            .at("com/acme/Inner.class")
            .merge(&mut sink)
            .unwrap();
        assert_eq!(sink.names(), vec!["com/acme/Inner.class"]);
    }

    #[test]
    fn destination_prefixes_directory_entries() {
        let dir = tempfile::tempdir().unwrap();
        create_fixture_dir(dir.path());
        for dest in ["com/acme", "com/acme/"] {
            let mut sink = MemorySink::default();
            FileMerge::new(dir.path().join("nested"))
                .at(dest)
                .merge(&mut sink)
                .unwrap();
            assert_eq!(
                sink.names(),
                vec!["com/acme/Inner.class", "com/acme/deeper/Deep.class"]
            );
        }
    }

    #[test]
    fn directory_merge_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        create_fixture_dir(dir.path());
        let merge = FileMerge::new(dir.path());
        let mut first = MemorySink::default();
        let mut second = MemorySink::default();
        merge.merge(&mut first).unwrap();
        merge.merge(&mut second).unwrap();
        assert_eq!(first.entries, second.entries);
    }

    #[test]
    fn empty_directory_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MemorySink::default();
        FileMerge::new(dir.path()).merge(&mut sink).unwrap();
        assert!(sink.entries.is_empty());
    }

    #[test]
    fn missing_path_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MemorySink::default();
        let err = FileMerge::new(dir.path().join("gone"))
            .merge(&mut sink)
            .unwrap_err();
        assert_eq!(err.kind(), MergeErrorKind::SourceUnreadable);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_in_tree_is_unsupported_by_default() {
        let dir = tempfile::tempdir().unwrap();
        create_fixture_dir(dir.path());
        std::os::unix::fs::symlink("FileMerge.class", dir.path().join("link.class")).unwrap();
        let mut sink = MemorySink::default();
        let err = FileMerge::new(dir.path()).merge(&mut sink).unwrap_err();
        assert_eq!(err.kind(), MergeErrorKind::UnsupportedSourceType);
        // The tree is validated before any entry is written.
        assert!(sink.entries.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_followed_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        create_fixture_dir(dir.path());
        std::os::unix::fs::symlink("FileMerge.class", dir.path().join("link.class")).unwrap();
        let mut sink = MemorySink::default();
        FileMerge::new(dir.path())
            .follow_links(true)
            .merge(&mut sink)
            .unwrap();
        let names = sink.names();
        assert!(names.contains(&"link.class"));
        assert!(names.contains(&"FileMerge.class"));
    }

    #[cfg(unix)]
    #[test]
    fn directory_link_cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a").join("x.txt"), "x").unwrap();
        std::os::unix::fs::symlink("..", dir.path().join("a").join("up")).unwrap();
        let mut sink = MemorySink::default();
        FileMerge::new(dir.path())
            .follow_links(true)
            .merge(&mut sink)
            .unwrap();
        assert_eq!(sink.names(), vec!["a/x.txt"]);
    }
}
