//! Build manifest parsing, normalization, and logical path types for classmerge.
//!
//! This crate defines the schema layer: TOML build manifest parsing (`ManifestV1`),
//! the validated, path-resolved representation consumed by a build
//! (`NormalizedManifest`), and the string newtypes (`LogicalPath`, `EntryName`)
//! shared by the resolver and the merge layer.

pub mod manifest;
pub mod normalize;
pub mod types;

pub use manifest::{
    parse_manifest_file, parse_manifest_str, ClasspathSection, ManifestError, ManifestV1,
    MergeSection, OutputSection, ResourcesSection,
};
pub use normalize::NormalizedManifest;
pub use types::{EntryName, LogicalPath, SEPARATOR};
