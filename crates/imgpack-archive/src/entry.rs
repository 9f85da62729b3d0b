use std::ops::Range;

use imgpack_types::Digest;
use serde::{Deserialize, Serialize};

use crate::index::IndexRecord;

/// Stable arena handle for an entry.
///
/// Ids are handed out in increasing order and never reused within one
/// archive, so ordering by id is insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct EntryId(pub(crate) u64);

/// A named view into the archive blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique name of the entry.
    pub name: String,
    /// Byte offset of the payload within the blob.
    pub offset: u64,
    /// Payload length in bytes.
    pub length: u32,
    /// Digest of the payload.
    pub digest: Digest,
}

impl Entry {
    /// One past the last byte of the payload.
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.length)
    }

    /// The payload range as slice indices.
    pub fn range(&self) -> Range<usize> {
        self.offset as usize..self.end() as usize
    }

    /// The index line for this entry.
    pub fn to_record(&self) -> IndexRecord {
        IndexRecord {
            name: self.name.clone(),
            offset: self.offset,
            length: self.length,
        }
    }
}
