//! Bulk ingestion of image files from a directory.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::archive::ImageArchive;
use crate::error::ArchiveResult;

/// Why a file was not added.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// An entry with the same name was already present.
    DuplicateName(String),
    /// The file name is not valid UTF-8.
    InvalidName,
    /// The file could not be read.
    Unreadable(String),
    /// The archive refused the payload.
    Rejected(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(f, "name {name:?} already in archive"),
            Self::InvalidName => write!(f, "file name is not valid UTF-8"),
            Self::Unreadable(e) => write!(f, "unreadable: {e}"),
            Self::Rejected(e) => write!(f, "rejected: {e}"),
        }
    }
}

/// A file passed over during ingestion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Outcome of [`ImageArchive::add_dir`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Number of files added.
    pub added: usize,
    pub skipped: Vec<SkippedFile>,
}

impl IngestReport {
    fn skip(&mut self, path: PathBuf, reason: SkipReason) {
        warn!(path = %path.display(), %reason, "skipping file");
        self.skipped.push(SkippedFile { path, reason });
    }
}

impl ImageArchive {
    /// Add every recognised image file directly inside `dir`.
    ///
    /// Files are visited extension by extension in the configured order
    /// (`png`, then `jpg`, then `jpeg` by default), and by file name within
    /// one extension. The entry name is the file name without its extension;
    /// the first file to claim a name wins. Per-file failures are recorded in
    /// the report and do not stop the scan.
    pub fn add_dir(&self, dir: impl AsRef<Path>) -> ArchiveResult<IngestReport> {
        let dir = dir.as_ref();
        let mut report = IngestReport::default();
        let listing = fs::read_dir(dir)?.map(|entry| entry.map(|e| e.path()));
        let candidates = order_images(dir, listing, &self.config().image_extensions, &mut report);

        let mut state = self.lock();
        for path in candidates {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                report.skip(path, SkipReason::InvalidName);
                continue;
            };
            if state.contains(&name) {
                report.skip(path, SkipReason::DuplicateName(name));
                continue;
            }
            match fs::read(&path) {
                Ok(bytes) => match state.insert(&name, &bytes) {
                    Ok(_) => report.added += 1,
                    Err(e) => report.skip(path, SkipReason::Rejected(e.to_string())),
                },
                Err(e) => report.skip(path, SkipReason::Unreadable(e.to_string())),
            }
        }

        info!(
            dir = %dir.display(),
            added = report.added,
            skipped = report.skipped.len(),
            "ingested directory"
        );
        Ok(report)
    }
}

/// Keep regular image files from a directory listing, grouped by extension
/// in `extensions` order. Listing entries that cannot be read are recorded
/// in `report` and skipped.
fn order_images(
    dir: &Path,
    listing: impl IntoIterator<Item = io::Result<PathBuf>>,
    extensions: &[String],
    report: &mut IngestReport,
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in listing {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => report.skip(dir.to_path_buf(), SkipReason::Unreadable(e.to_string())),
        }
    }
    files.sort();

    let mut ordered = Vec::with_capacity(files.len());
    for ext in extensions {
        ordered.extend(
            files
                .iter()
                .filter(|path| has_extension(path, ext))
                .cloned(),
        );
    }
    ordered
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
