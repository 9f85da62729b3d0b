//! Reading and writing archives on disk.
//!
//! An archive is stored as a pair of files sharing a base name: the text
//! index (`<base>.UVGI` by default) and the raw blob (`<base>.UVGA`). The
//! blob path is always derived from the index path, so the two files must
//! live side by side. Writes are not atomic across the pair.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};

use crate::archive::ImageArchive;
use crate::config::ArchiveConfig;
use crate::entry::Entry;
use crate::error::{ArchiveError, ArchiveResult};
use crate::index::{decode_index, encode_index, is_portable_name, ParseMode, SkippedLine};

/// Files produced by [`ImageArchive::persist`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveFiles {
    pub index_path: PathBuf,
    pub blob_path: PathBuf,
    pub entry_count: usize,
    pub index_size: u64,
    pub blob_size: u64,
}

/// Outcome of loading an archive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// The entry count from the index header, if present.
    pub declared_count: Option<usize>,
    /// Number of entries loaded.
    pub loaded: usize,
    /// Lines dropped in lenient mode.
    pub skipped: Vec<SkippedLine>,
}

impl ImageArchive {
    /// Load an archive from an index file with the default configuration.
    pub fn open(index_path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Self::open_with(index_path, ArchiveConfig::default()).map(|(archive, _)| archive)
    }

    /// Load an archive from an index file.
    ///
    /// Every record's bytes are read from the paired blob file and re-added,
    /// so duplicate payloads are collapsed again. In lenient mode malformed
    /// lines, entries extending past the end of the blob, and repeated names
    /// are dropped and listed in the report; in strict mode they fail the
    /// load.
    pub fn open_with(
        index_path: impl AsRef<Path>,
        config: ArchiveConfig,
    ) -> ArchiveResult<(Self, LoadReport)> {
        let index_path = index_path.as_ref();
        let blob_path = config.blob_path_for(index_path);
        let mode = config.parse_mode;

        let index_data = fs::read(index_path)?;
        let blob = fs::read(&blob_path)?;
        let contents = decode_index(&index_data, mode)?;

        let archive = Self::with_config(config);
        let mut report = LoadReport {
            declared_count: contents.declared_count,
            loaded: 0,
            skipped: contents.skipped,
        };

        {
            let mut state = archive.lock();
            for located in contents.records {
                let record = located.record;
                let start = record.offset;
                let end = start.saturating_add(u64::from(record.length));
                if end > blob.len() as u64 {
                    if mode == ParseMode::Strict {
                        return Err(ArchiveError::ShortRead {
                            name: record.name,
                            offset: record.offset,
                            length: record.length,
                            available: blob.len() as u64,
                        });
                    }
                    report.skipped.push(SkippedLine {
                        line: located.line,
                        reason: format!(
                            "short read: {} bytes at offset {} exceed blob of {} bytes",
                            record.length,
                            record.offset,
                            blob.len()
                        ),
                    });
                    continue;
                }

                let bytes = &blob[start as usize..end as usize];
                match state.insert(&record.name, bytes) {
                    Ok(_) => report.loaded += 1,
                    Err(e) if mode == ParseMode::Strict => return Err(e),
                    Err(e) => report.skipped.push(SkippedLine {
                        line: located.line,
                        reason: e.to_string(),
                    }),
                }
            }
        }

        for skipped in &report.skipped {
            warn!(line = skipped.line, reason = %skipped.reason, "skipped index line");
        }
        info!(
            index = %index_path.display(),
            loaded = report.loaded,
            skipped = report.skipped.len(),
            "loaded archive"
        );
        Ok((archive, report))
    }

    /// Write every entry to `dir/<name>.<export_extension>`.
    ///
    /// Creates `dir` if needed and overwrites existing files. Returns the
    /// number of files written.
    pub fn export_dir(&self, dir: impl AsRef<Path>) -> ArchiveResult<usize> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let state = self.lock();
        let mut written = 0;
        for entry in state.entries.values() {
            let path = export_path(dir, entry, &self.config().export_extension)?;
            fs::write(&path, state.payload(entry))?;
            written += 1;
        }
        info!(dir = %dir.display(), written, "exported archive");
        Ok(written)
    }

    /// Write the archive as an index/blob pair named `base_name` in `dir`.
    pub fn persist(&self, dir: impl AsRef<Path>, base_name: &str) -> ArchiveResult<ArchiveFiles> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let config = self.config();
        let index_path = config.index_path(dir, base_name);
        let blob_path = config.blob_path(dir, base_name);

        let state = self.lock();
        let records: Vec<_> = state.entries.values().map(Entry::to_record).collect();
        for record in records.iter().filter(|r| !is_portable_name(&r.name)) {
            warn!(name = %record.name, "name will not survive reloading the index");
        }

        fs::write(&blob_path, &state.blob)?;
        let index = encode_index(&records);
        fs::write(&index_path, &index)?;

        let files = ArchiveFiles {
            index_path,
            blob_path,
            entry_count: records.len(),
            index_size: index.len() as u64,
            blob_size: state.blob.len() as u64,
        };
        info!(
            index = %files.index_path.display(),
            entries = files.entry_count,
            blob_size = files.blob_size,
            "saved archive"
        );
        Ok(files)
    }

    /// Like [`persist`](Self::persist), but reports failure as `false`.
    pub fn save(&self, dir: impl AsRef<Path>, base_name: &str) -> bool {
        match self.persist(dir.as_ref(), base_name) {
            Ok(_) => true,
            Err(e) => {
                warn!(dir = %dir.as_ref().display(), base_name, error = %e, "failed to save archive");
                false
            }
        }
    }
}

/// Export target for an entry, refusing names that escape `dir`.
fn export_path(dir: &Path, entry: &Entry, extension: &str) -> ArchiveResult<PathBuf> {
    let file_name = format!("{}.{extension}", entry.name);
    let mut components = Path::new(&file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(file_name)),
        _ => Err(ArchiveError::UnsafeName(entry.name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImageArchive {
        let archive = ImageArchive::new();
        archive.add("button", &[1, 2, 3, 4]).unwrap();
        archive.add("button_hover", &[1, 2, 3, 4]).unwrap();
        archive.add("frame", &[9, 8]).unwrap();
        archive
    }

    fn write_pair(dir: &Path, index: &[u8], blob: &[u8]) -> PathBuf {
        let index_path = dir.join("pack.UVGI");
        fs::write(&index_path, index).unwrap();
        fs::write(dir.join("pack.UVGA"), blob).unwrap();
        index_path
    }

    // -----------------------------------------------------------------------
    // Persist
    // -----------------------------------------------------------------------

    #[test]
    fn persist_writes_index_and_blob() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ImageArchive::new();
        archive.add("img", &[10, 20, 30, 40]).unwrap();

        let files = archive.persist(dir.path(), "demo").unwrap();
        assert_eq!(files.index_path, dir.path().join("demo.UVGI"));
        assert_eq!(files.blob_path, dir.path().join("demo.UVGA"));
        assert_eq!(files.entry_count, 1);

        let index = fs::read(&files.index_path).unwrap();
        let text = String::from_utf8(index).unwrap();
        let lines: Vec<_> = text.split("\r\n").collect();
        assert_eq!(lines, vec!["1", "img 0 4"]);
        assert_eq!(fs::read(&files.blob_path).unwrap(), vec![10, 20, 30, 40]);
        assert_eq!(files.blob_size, 4);
    }

    #[test]
    fn persist_creates_directory_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let big = ImageArchive::new();
        big.add("a", &[0; 64]).unwrap();
        big.persist(&out, "gui").unwrap();

        let small = ImageArchive::new();
        small.add("b", &[1]).unwrap();
        let files = small.persist(&out, "gui").unwrap();
        assert_eq!(fs::read(files.blob_path).unwrap(), vec![1]);
    }

    #[test]
    fn persist_lists_shared_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let files = sample().persist(dir.path(), "gui").unwrap();
        let index = fs::read(files.index_path).unwrap();
        assert_eq!(index, b"3\r\nbutton 0 4\r\nbutton_hover 0 4\r\nframe 4 2");
        assert_eq!(files.blob_size, 6);
    }

    #[test]
    fn save_reports_failure_as_false() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();
        assert!(!sample().save(&blocker, "gui"));
        assert!(sample().save(dir.path(), "gui"));
    }

    // -----------------------------------------------------------------------
    // Open
    // -----------------------------------------------------------------------

    #[test]
    fn roundtrip_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let original = sample();
        let files = original.persist(dir.path(), "gui").unwrap();

        let (loaded, report) =
            ImageArchive::open_with(&files.index_path, ArchiveConfig::default()).unwrap();
        assert_eq!(report.declared_count, Some(3));
        assert_eq!(report.loaded, 3);
        assert!(report.skipped.is_empty());
        assert_eq!(loaded.names(), original.names());
        for name in original.names() {
            assert_eq!(loaded.get(&name), original.get(&name));
        }
        assert_eq!(loaded.unique_len(), 2);
        assert_eq!(loaded.blob_len(), 6);
    }

    #[test]
    fn open_missing_blob_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("lonely.UVGI");
        fs::write(&index_path, b"0").unwrap();
        let err = ImageArchive::open(&index_path).unwrap_err();
        assert!(matches!(err, ArchiveError::Io(_)));
    }

    #[test]
    fn lenient_open_drops_short_reads_and_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let index = b"4\r\nok 0 2\r\ngarbage\r\ntruncated 2 10\r\nok 0 2";
        let index_path = write_pair(dir.path(), index, &[5, 6, 7]);

        let (archive, report) =
            ImageArchive::open_with(&index_path, ArchiveConfig::default()).unwrap();
        assert_eq!(archive.names(), vec!["ok"]);
        assert_eq!(archive.get("ok"), Some(vec![5, 6]));
        assert_eq!(report.loaded, 1);
        let lines: Vec<_> = report.skipped.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn strict_open_fails_on_short_read() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = write_pair(dir.path(), b"1\r\nbig 0 10", &[1, 2]);
        let err = ImageArchive::open_with(&index_path, ArchiveConfig::strict()).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::ShortRead { length: 10, available: 2, .. }
        ));
    }

    #[test]
    fn strict_open_fails_on_duplicate_name() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = write_pair(dir.path(), b"2\r\na 0 1\r\na 1 1", &[1, 2]);
        let err = ImageArchive::open_with(&index_path, ArchiveConfig::strict()).unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateKey(_)));
    }

    #[test]
    fn open_rededuplicates_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = write_pair(dir.path(), b"2\r\na 0 2\r\nb 2 2", &[3, 3, 3, 3]);
        let archive = ImageArchive::open(&index_path).unwrap();
        assert_eq!(archive.unique_len(), 1);
        assert_eq!(archive.blob_len(), 2);
        assert_eq!(archive.entry("b").unwrap().offset, 0);
    }

    #[test]
    fn open_uses_configured_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArchiveConfig {
            index_extension: "idx".into(),
            blob_extension: "dat".into(),
            parse_mode: ParseMode::Strict,
            ..Default::default()
        };
        let archive = ImageArchive::with_config(config.clone());
        archive.add("a", b"payload").unwrap();
        let files = archive.persist(dir.path(), "custom").unwrap();
        assert_eq!(files.blob_path, dir.path().join("custom.dat"));

        let (loaded, _) = ImageArchive::open_with(&files.index_path, config).unwrap();
        assert_eq!(loaded.get("a"), Some(b"payload".to_vec()));
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    #[test]
    fn export_writes_one_file_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("images");
        assert_eq!(sample().export_dir(&out).unwrap(), 3);
        assert_eq!(fs::read(out.join("button.png")).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(fs::read(out.join("button_hover.png")).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(fs::read(out.join("frame.png")).unwrap(), vec![9, 8]);
    }

    #[test]
    fn export_refuses_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ImageArchive::new();
        archive.add("../escape", b"x").unwrap();
        let err = archive.export_dir(dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsafeName(_)));
        assert!(!dir.path().join("escape.png").exists());
    }
}
