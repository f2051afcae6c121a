use crate::manifest::{parse_manifest_file, ManifestError, ManifestV1};
use crate::types::LogicalPath;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Validated build manifest with every relative path resolved.
///
/// Relative paths are anchored at the directory containing the manifest, the
/// search path keeps only the first occurrence of each archive, and logical
/// paths use `/` separators. Merge paths keep their declared order and
/// duplicates, since the coordinator deduplicates at the entry level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedManifest {
    pub manifest_version: u32,
    pub output: PathBuf,
    pub resource_roots: Vec<PathBuf>,
    pub follow_links: bool,
    pub search_path: Vec<PathBuf>,
    pub paths: Vec<LogicalPath>,
    pub keep_going: bool,
}

impl ManifestV1 {
    /// Normalize the manifest: validate fields and resolve paths against `base_dir`.
    pub fn normalize(&self, base_dir: &Path) -> Result<NormalizedManifest, ManifestError> {
        if self.manifest_version != 1 {
            return Err(ManifestError::UnsupportedVersion(self.manifest_version));
        }

        if self.output.path.as_os_str().is_empty() {
            return Err(ManifestError::EmptyOutputPath);
        }

        let mut seen = HashSet::new();
        let mut search_path = Vec::with_capacity(self.classpath.archives.len());
        for (i, archive) in self.classpath.archives.iter().enumerate() {
            if archive.as_os_str().is_empty() {
                return Err(ManifestError::EmptyArchivePath(i));
            }
            let resolved = anchor(base_dir, archive);
            if seen.insert(resolved.clone()) {
                search_path.push(resolved);
            }
        }

        let mut paths = Vec::with_capacity(self.merge.paths.len());
        for (i, raw) in self.merge.paths.iter().enumerate() {
            let path = LogicalPath::normalized(raw);
            if path.is_empty() {
                return Err(ManifestError::EmptyLogicalPath(i));
            }
            paths.push(path);
        }

        Ok(NormalizedManifest {
            manifest_version: self.manifest_version,
            output: anchor(base_dir, &self.output.path),
            resource_roots: self
                .resources
                .roots
                .iter()
                .map(|r| anchor(base_dir, r))
                .collect(),
            follow_links: self.resources.follow_links,
            search_path,
            paths,
            keep_going: self.merge.keep_going,
        })
    }
}

impl NormalizedManifest {
    /// Parse and normalize a manifest file, anchoring paths at its directory.
    pub fn load(manifest_path: &Path) -> Result<Self, ManifestError> {
        let manifest = parse_manifest_file(manifest_path)?;
        let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        manifest.normalize(base_dir)
    }
}

fn anchor(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
