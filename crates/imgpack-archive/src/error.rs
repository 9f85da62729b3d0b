use std::path::PathBuf;

use thiserror::Error;

/// Errors from archive operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An entry with this name is already present.
    #[error("key already exists: {0}")]
    DuplicateKey(String),

    /// No entry with this name is present.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The payload does not fit the index's 32-bit length field.
    #[error("entry {name} is too large: {size} bytes")]
    EntryTooLarge { name: String, size: usize },

    /// The name cannot be used as a file name when exporting.
    #[error("unsafe entry name for export: {0:?}")]
    UnsafeName(String),

    /// A line of the index file could not be parsed (strict mode).
    #[error("malformed index line {line}: {reason}")]
    MalformedIndex { line: usize, reason: String },

    /// An index entry points past the end of the blob file (strict mode).
    #[error("short read for {name}: {length} bytes at offset {offset}, blob holds {available}")]
    ShortRead {
        name: String,
        offset: u64,
        length: u32,
        available: u64,
    },

    /// The configuration could not be loaded.
    #[error("invalid configuration in {path:?}: {reason}")]
    Config { path: Option<PathBuf>, reason: String },

    /// I/O error while reading or writing archive files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
