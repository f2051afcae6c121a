use crate::concurrency::OutputLock;
use crate::coordinator::{MergeCoordinator, MergeSummary, WriteReport};
use crate::resolver::{ClasspathResolver, Resolved};
use crate::CoreError;
use classmerge_archive::{ArchiveIndexCache, MergeError};
use classmerge_schema::{LogicalPath, NormalizedManifest};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-path outcome of a manifest build.
#[derive(Debug, Clone, Serialize)]
pub struct MergedPath {
    pub path: LogicalPath,
    pub source: String,
    pub written: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedPath {
    pub path: LogicalPath,
    pub kind: String,
    pub message: String,
}

/// Result of running every merge request of a manifest.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub summary: MergeSummary,
    pub merged: Vec<MergedPath>,
    pub failures: Vec<FailedPath>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Everything one build owns: the output lock, a fresh archive index cache,
/// the resolver, and the coordinator.
///
/// Nothing survives the session: caches and the dedup set are created in
/// [`start`](Self::start) and dropped with the session, whether it ends in
/// [`finish`](Self::finish) or in an error.
pub struct BuildSession {
    resolver: ClasspathResolver,
    coordinator: MergeCoordinator,
    _lock: OutputLock,
}

impl BuildSession {
    pub fn start(manifest: &NormalizedManifest) -> Result<Self, CoreError> {
        info!(
            "starting build of {} ({} search path entries)",
            manifest.output.display(),
            manifest.search_path.len()
        );
        let lock = OutputLock::acquire(&manifest.output)?;

        for archive in &manifest.search_path {
            if !archive.exists() {
                warn!("search path entry {} does not exist", archive.display());
            }
        }

        let resolver = ClasspathResolver::new(manifest.search_path.iter().cloned())
            .with_resource_roots(manifest.resource_roots.iter().cloned())
            .with_follow_links(manifest.follow_links)
            .with_index_cache(Arc::new(ArchiveIndexCache::new()));
        let coordinator = MergeCoordinator::create(&manifest.output)?;

        Ok(Self {
            resolver,
            coordinator,
            _lock: lock,
        })
    }

    pub fn resolver(&self) -> &ClasspathResolver {
        &self.resolver
    }

    pub fn coordinator(&self) -> &MergeCoordinator {
        &self.coordinator
    }

    /// Resolve a logical path and write it to the output.
    pub fn merge_path(&self, logical: &LogicalPath) -> Result<WriteReport, MergeError> {
        let resolved = self.resolver.resolve(logical)?;
        self.coordinator.write(&resolved)
    }

    /// Run every merge request in declared order.
    ///
    /// Resolution runs in parallel up front; writes happen one at a time in
    /// the order the paths were given. With `keep_going`, a failed request is
    /// recorded and the build continues; otherwise the first failure aborts
    /// the build and no output is produced.
    pub fn run(self, paths: &[LogicalPath], keep_going: bool) -> Result<BuildReport, CoreError> {
        let resolved = self.resolver.resolve_all(paths);

        let mut merged = Vec::with_capacity(paths.len());
        let mut failures = Vec::new();
        for (path, resolution) in paths.iter().zip(resolved) {
            match self.write_resolved(resolution) {
                Ok((resolved, report)) => merged.push(MergedPath {
                    path: path.clone(),
                    source: resolved.to_string(),
                    written: report.written,
                    skipped: report.skipped,
                }),
                Err(e) if keep_going => {
                    warn!("merge of '{path}' failed: {e}");
                    failures.push(FailedPath {
                        path: path.clone(),
                        kind: format!("{:?}", e.kind()),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    return Err(CoreError::PathFailed {
                        path: path.clone(),
                        source: e,
                    })
                }
            }
        }

        let summary = self.finish()?;
        Ok(BuildReport {
            summary,
            merged,
            failures,
        })
    }

    fn write_resolved(
        &self,
        resolution: Result<Resolved, MergeError>,
    ) -> Result<(Resolved, WriteReport), MergeError> {
        let resolved = resolution?;
        let report = self.coordinator.write(&resolved)?;
        Ok((resolved, report))
    }

    /// Close the output archive and end the session.
    pub fn finish(self) -> Result<MergeSummary, CoreError> {
        let summary = self.coordinator.close()?;
        info!(
            "build finished: {} entries, {} index scans",
            summary.entries,
            self.resolver.index().scans()
        );
        Ok(summary)
    }
}

/// Load a manifest and run its build to completion.
pub fn build_from_manifest(manifest_path: &Path) -> Result<BuildReport, CoreError> {
    let manifest = NormalizedManifest::load(manifest_path)?;
    let session = BuildSession::start(&manifest)?;
    session.run(&manifest.paths, manifest.keep_going)
}
