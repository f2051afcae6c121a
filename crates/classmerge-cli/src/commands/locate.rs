use super::{json_pretty, EXIT_SUCCESS};
use classmerge_core::{ClasspathResolver, CoreError};
use classmerge_schema::{LogicalPath, NormalizedManifest};
use std::path::{Path, PathBuf};

fn search_path(classpath: &[PathBuf], manifest: Option<&Path>) -> Result<Vec<PathBuf>, String> {
    match manifest {
        Some(path) => NormalizedManifest::load(path)
            .map(|m| m.search_path)
            .map_err(|e| CoreError::from(e).to_string()),
        None => Ok(classpath.to_vec()),
    }
}

pub fn run(
    path: &str,
    classpath: &[PathBuf],
    manifest: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    let logical = LogicalPath::normalized(path);
    if logical.is_empty() {
        return Err("logical path must not be empty".to_owned());
    }
    let resolver = ClasspathResolver::new(search_path(classpath, manifest)?);
    let archive = resolver
        .locate_archive(&logical)
        .map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "path": logical,
            "archive": archive,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{}", archive.display());
    }
    Ok(EXIT_SUCCESS)
}
