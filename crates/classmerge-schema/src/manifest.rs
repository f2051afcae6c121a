use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported manifest_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("output.path must not be empty")]
    EmptyOutputPath,
    #[error("merge.paths[{0}] must not be empty")]
    EmptyLogicalPath(usize),
    #[error("classpath.archives[{0}] must not be empty")]
    EmptyArchivePath(usize),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ManifestV1 {
    pub manifest_version: u32,
    pub output: OutputSection,
    #[serde(default)]
    pub resources: ResourcesSection,
    #[serde(default)]
    pub classpath: ClasspathSection,
    #[serde(default)]
    pub merge: MergeSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResourcesSection {
    /// Filesystem roots consulted before any archive.
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    #[serde(default)]
    pub follow_links: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClasspathSection {
    /// Ordered search path; the first archive containing a path wins.
    #[serde(default)]
    pub archives: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MergeSection {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub keep_going: bool,
}

pub fn parse_manifest_str(input: &str) -> Result<ManifestV1, ManifestError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ManifestV1, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}
