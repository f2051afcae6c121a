use super::{json_pretty, EXIT_SUCCESS};
use classmerge_archive::ArchiveIndex;
use classmerge_schema::EntryName;
use std::path::Path;

pub fn run(archive: &Path, prefix: Option<&str>, json: bool) -> Result<u8, String> {
    let index = ArchiveIndex::scan(archive).map_err(|e| e.to_string())?;
    let names: Vec<&str> = index
        .entries()
        .iter()
        .map(EntryName::as_str)
        .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
        .collect();

    if json {
        let payload = serde_json::json!({
            "archive": index.path(),
            "total": index.len(),
            "entries": names,
        });
        println!("{}", json_pretty(&payload)?);
    } else if names.is_empty() {
        println!("no matching entries in {}", archive.display());
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(EXIT_SUCCESS)
}
