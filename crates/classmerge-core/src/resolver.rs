use classmerge_archive::{
    ArchiveIndexCache, EntrySink, FileMerge, JarMerge, JarTarget, MergeError, Mergeable,
};
use classmerge_schema::{EntryName, LogicalPath};
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// The mergeable a logical path resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Found under a resource root (or given as an absolute filesystem path).
    File(FileMerge),
    /// Found inside an archive on the search path.
    Jar(JarMerge),
}

impl Resolved {
    /// Where the content comes from: the file/directory, or the archive.
    pub fn source(&self) -> &Path {
        match self {
            Self::File(f) => f.path(),
            Self::Jar(j) => j.archive(),
        }
    }
}

impl Mergeable for Resolved {
    fn merge(&self, sink: &mut dyn EntrySink) -> Result<(), MergeError> {
        match self {
            Self::File(f) => f.merge(sink),
            Self::Jar(j) => j.merge(sink),
        }
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(m) => fmt::Display::fmt(m, f),
            Self::Jar(m) => fmt::Display::fmt(m, f),
        }
    }
}

/// Finds where a logical path lives: under a filesystem resource root, or
/// inside the first archive of the search path that contains it.
///
/// Filesystem resources take priority over archived ones. Archives are
/// consulted in search-path order through a shared [`ArchiveIndexCache`], so
/// each archive's listing is read once per build no matter how many paths are
/// resolved against it.
#[derive(Debug)]
pub struct ClasspathResolver {
    resource_roots: Vec<PathBuf>,
    search_path: Vec<PathBuf>,
    follow_links: bool,
    index: Arc<ArchiveIndexCache>,
}

impl ClasspathResolver {
    /// Create a resolver over an ordered search path of archive locations.
    ///
    /// Locations are made absolute up front; archives that do not exist are
    /// kept and skipped at lookup time.
    pub fn new<I, P>(search_path: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            resource_roots: Vec::new(),
            search_path: search_path
                .into_iter()
                .map(|p| absolutize(p.into()))
                .collect(),
            follow_links: false,
            index: Arc::new(ArchiveIndexCache::new()),
        }
    }

    #[must_use]
    pub fn with_resource_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.resource_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Share an index cache with other resolvers of the same build.
    #[must_use]
    pub fn with_index_cache(mut self, index: Arc<ArchiveIndexCache>) -> Self {
        self.index = index;
        self
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    pub fn resource_roots(&self) -> &[PathBuf] {
        &self.resource_roots
    }

    pub fn index(&self) -> &ArchiveIndexCache {
        &self.index
    }

    /// Resolve a logical path to the mergeable that provides it.
    pub fn resolve(&self, logical: &LogicalPath) -> Result<Resolved, MergeError> {
        if let Some(path) = self.find_on_filesystem(logical) {
            debug!("resolved '{logical}' to {}", path.display());
            let file = FileMerge::new(path).follow_links(self.follow_links);
            // Root-relative resources keep their logical name in the output.
            let file = if Path::new(logical.as_str()).is_absolute() {
                file
            } else {
                file.at(logical.clone())
            };
            return Ok(Resolved::File(file));
        }

        let (archive, target) = self.find_in_archives(logical)?;
        debug!("resolved '{logical}' to {target} in {}", archive.display());
        Ok(Resolved::Jar(JarMerge::new(archive, target)))
    }

    /// Resolve many logical paths in parallel; results keep the input order.
    pub fn resolve_all(&self, paths: &[LogicalPath]) -> Vec<Result<Resolved, MergeError>> {
        paths.par_iter().map(|p| self.resolve(p)).collect()
    }

    /// Absolute location of the first archive on the search path containing
    /// `logical`. Filesystem resources are not consulted.
    pub fn locate_archive(&self, logical: &LogicalPath) -> Result<PathBuf, MergeError> {
        self.find_in_archives(logical).map(|(archive, _)| archive)
    }

    fn find_on_filesystem(&self, logical: &LogicalPath) -> Option<PathBuf> {
        let relative = Path::new(logical.as_str());
        if relative.is_absolute() {
            return relative.exists().then(|| relative.to_path_buf());
        }
        self.resource_roots
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| fs::symlink_metadata(candidate).is_ok())
    }

    fn find_in_archives(
        &self,
        logical: &LogicalPath,
    ) -> Result<(PathBuf, JarTarget), MergeError> {
        let mut searched = 0;
        for archive in &self.search_path {
            if !archive.exists() {
                trace!("search path entry {} does not exist", archive.display());
                continue;
            }
            let index = self.index.get(archive)?;
            searched += 1;

            let target = if logical.is_prefix() {
                index
                    .contains_prefix(logical)
                    .then(|| JarTarget::Prefix(logical.clone()))
            } else if index.contains_entry(logical) {
                Some(JarTarget::Entry(EntryName::new(logical.as_str())))
            } else {
                // A package named without its trailing separator.
                let package = logical.as_prefix();
                index
                    .contains_prefix(&package)
                    .then_some(JarTarget::Prefix(package))
            };

            if let Some(target) = target {
                return Ok((archive.clone(), target));
            }
        }

        Err(MergeError::ResourceNotFound {
            path: logical.clone(),
            searched,
        })
    }
}

fn absolutize(path: PathBuf) -> PathBuf {
    fs::canonicalize(&path)
        .or_else(|_| std::path::absolute(&path))
        .unwrap_or(path)
}
