use crate::mergeable::{EntryOutcome, EntrySink};
use crate::{zip_io, MergeError};
use classmerge_schema::EntryName;
use std::collections::HashMap;
use std::io::{Seek, Write};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

const ENTRY_MODE: u32 = 0o644;

/// Zip container writer producing stored (uncompressed) file entries.
///
/// Determinism guarantees:
/// - Entries appear in the order they were put
/// - All timestamps set to the zip epoch (1980-01-01)
/// - All permissions set to 0644
pub struct ZipSink<W: Write + Seek> {
    writer: ZipWriter<W>,
    written: Vec<EntryName>,
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: ZipWriter::new(inner),
            written: Vec::new(),
        }
    }

    /// Names written so far, in container order.
    pub fn entries(&self) -> &[EntryName] {
        &self.written
    }

    /// Write the central directory and return the underlying writer.
    pub fn finish(self) -> Result<W, MergeError> {
        self.writer
            .finish()
            .map_err(|e| MergeError::OutputWrite(zip_io(e)))
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::default())
            .unix_permissions(ENTRY_MODE)
    }
}

impl<W: Write + Seek> EntrySink for ZipSink<W> {
    fn put_entry(&mut self, name: &EntryName, data: &[u8]) -> Result<EntryOutcome, MergeError> {
        self.writer
            .start_file(name.as_str(), Self::options())
            .map_err(|e| MergeError::OutputWrite(zip_io(e)))?;
        self.writer.write_all(data).map_err(MergeError::OutputWrite)?;
        self.written.push(name.clone());
        Ok(EntryOutcome::Written)
    }
}

/// Names already written to one output container, with a digest of each
/// entry's bytes. Only grows for the lifetime of a build.
#[derive(Debug, Default)]
pub struct SeenEntries {
    digests: HashMap<EntryName, blake3::Hash>,
}

impl SeenEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &EntryName) -> bool {
        self.digests.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// Sink wrapper that silently skips any entry name already in a [`SeenEntries`] set.
///
/// The first writer of a name wins. A skipped duplicate whose bytes differ
/// from the retained entry is logged, since it usually means two dependencies
/// ship different versions of the same resource.
pub struct DedupSink<'a> {
    inner: &'a mut dyn EntrySink,
    seen: &'a mut SeenEntries,
    written: usize,
    skipped: usize,
}

impl<'a> DedupSink<'a> {
    pub fn new(inner: &'a mut dyn EntrySink, seen: &'a mut SeenEntries) -> Self {
        Self {
            inner,
            seen,
            written: 0,
            skipped: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl EntrySink for DedupSink<'_> {
    fn put_entry(&mut self, name: &EntryName, data: &[u8]) -> Result<EntryOutcome, MergeError> {
        let digest = blake3::hash(data);
        if let Some(existing) = self.seen.digests.get(name) {
            if *existing == digest {
                debug!("skipping duplicate entry {name}");
            } else {
                warn!("skipping duplicate entry {name}: content differs from the first copy");
            }
            self.skipped += 1;
            return Ok(EntryOutcome::Skipped);
        }

        let outcome = self.inner.put_entry(name, data)?;
        if outcome == EntryOutcome::Written {
            self.seen.digests.insert(name.clone(), digest);
            self.written += 1;
            debug!("wrote entry {name} ({} bytes)", data.len());
        }
        Ok(outcome)
    }
}
