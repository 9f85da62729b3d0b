//! Content-addressed image archive.
//!
//! An [`ImageArchive`] packs named payloads (usually image files) into one
//! contiguous blob and keeps a text index of `name offset length` triples.
//! Payloads are deduplicated by their MD5 [`Digest`]: adding bytes that are
//! already stored only records another name for the existing range.
//!
//! # Architecture
//!
//! - **Blob** (`.UVGA`): raw concatenation of every distinct payload
//! - **Index** (`.UVGI`): entry count, then one `name offset length` line per entry
//! - **ImageArchive**: in-memory blob plus an entry arena with name and digest
//!   indices, guarded by a single lock
//! - **add_dir** / **export_dir**: bulk ingestion from and expansion to image files
//! - **persist** / **open_with**: writing and reading the index/blob pair
//!
//! # Design Rules
//!
//! 1. Names are unique; adding a taken name fails and changes nothing.
//! 2. Equal digests share one byte range; different digests never overlap.
//! 3. Removing the last name for a payload cuts its bytes out of the blob.
//! 4. Loading is lenient by default: bad lines are reported, not fatal.

pub mod archive;
pub mod config;
pub mod entry;
pub mod error;
pub mod index;
pub mod ingest;
pub mod persist;

pub use archive::ImageArchive;
pub use config::ArchiveConfig;
pub use entry::Entry;
pub use error::{ArchiveError, ArchiveResult};
pub use imgpack_types::Digest;
pub use index::{IndexRecord, ParseMode, SkippedLine};
pub use ingest::{IngestReport, SkipReason, SkippedFile};
pub use persist::{ArchiveFiles, LoadReport};
