use crate::MergeError;
use classmerge_schema::EntryName;
use std::fmt;

/// What an [`EntrySink`] did with an entry it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Written,
    /// The name was already present; nothing was written.
    Skipped,
}

/// An output container that accepts named file entries.
///
/// Entries are handed over whole, so a sink never holds a partially written entry.
pub trait EntrySink {
    fn put_entry(&mut self, name: &EntryName, data: &[u8]) -> Result<EntryOutcome, MergeError>;
}

/// A content source that knows how to write itself into an output container.
///
/// Implementations hold no mutable state after construction and may be merged
/// any number of times; repeated merges produce the same entries.
pub trait Mergeable: fmt::Debug + fmt::Display + Send + Sync {
    fn merge(&self, sink: &mut dyn EntrySink) -> Result<(), MergeError>;
}

impl<M: Mergeable + ?Sized> Mergeable for Box<M> {
    fn merge(&self, sink: &mut dyn EntrySink) -> Result<(), MergeError> {
        (**self).merge(sink)
    }
}

impl<M: Mergeable + ?Sized> Mergeable for &M {
    fn merge(&self, sink: &mut dyn EntrySink) -> Result<(), MergeError> {
        (**self).merge(sink)
    }
}
