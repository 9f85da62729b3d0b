//! Foundation types for imgpack.
//!
//! Every other imgpack crate depends on `imgpack-types` for the content
//! digest used to deduplicate archive payloads.
//!
//! # Key Types
//!
//! - [`Digest`] — 128-bit content hash (MD5) identifying a payload
//! - [`TypeError`] — conversion failures (hex parsing, byte lengths)

pub mod digest;
pub mod error;

pub use digest::Digest;
pub use error::TypeError;
