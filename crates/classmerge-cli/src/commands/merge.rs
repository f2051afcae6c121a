use super::{
    colorize_status, json_pretty, spin_fail, spin_ok, spinner, EXIT_MERGE_ERROR, EXIT_SUCCESS,
};
use classmerge_core::{BuildReport, BuildSession, CoreError};
use classmerge_schema::NormalizedManifest;
use std::path::Path;

fn build(manifest: &Path, keep_going: bool) -> Result<BuildReport, CoreError> {
    let manifest = NormalizedManifest::load(manifest)?;
    let session = BuildSession::start(&manifest)?;
    session.run(&manifest.paths, keep_going || manifest.keep_going)
}

pub fn run(manifest: &Path, keep_going: bool, json: bool) -> Result<u8, String> {
    let pb = if json {
        None
    } else {
        Some(spinner("merging resources..."))
    };

    let report = match build(manifest, keep_going) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                if r.is_clean() {
                    spin_ok(pb, "output assembled");
                } else {
                    spin_fail(pb, "output assembled with failures");
                }
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "merge failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        for m in &report.merged {
            let status = if m.written == 0 && m.skipped > 0 {
                "skipped"
            } else {
                "merged"
            };
            println!(
                "{:<8} {}  <- {} ({} written, {} skipped)",
                colorize_status(status),
                m.path,
                m.source,
                m.written,
                m.skipped
            );
        }
        for f in &report.failures {
            println!("{:<8} {}  {}", colorize_status("failed"), f.path, f.message);
        }
        println!(
            "wrote {} ({} entries, {} duplicates skipped)",
            report.summary.output.display(),
            report.summary.entries,
            report.summary.skipped
        );
        println!("digest: {}", report.summary.digest);
    }

    if report.is_clean() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_MERGE_ERROR)
    }
}
