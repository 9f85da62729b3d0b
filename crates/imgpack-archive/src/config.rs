use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, ArchiveResult};
use crate::index::ParseMode;

/// File naming and parsing settings for an archive.
///
/// Loadable from TOML; every key is optional and falls back to the default.
///
/// ```toml
/// index_extension = "UVGI"
/// blob_extension = "UVGA"
/// export_extension = "png"
/// image_extensions = ["png", "jpg", "jpeg"]
/// parse_mode = "lenient"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Extension of the text index file.
    pub index_extension: String,
    /// Extension of the binary blob file.
    pub blob_extension: String,
    /// Extension given to files written by `export_dir`.
    pub export_extension: String,
    /// Extensions picked up by `add_dir`, in scan order.
    pub image_extensions: Vec<String>,
    /// Tolerance of index loading.
    pub parse_mode: ParseMode,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            index_extension: "UVGI".into(),
            blob_extension: "UVGA".into(),
            export_extension: "png".into(),
            image_extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
            parse_mode: ParseMode::Lenient,
        }
    }
}

impl ArchiveConfig {
    /// The default configuration with strict index parsing.
    pub fn strict() -> Self {
        Self {
            parse_mode: ParseMode::Strict,
            ..Default::default()
        }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ArchiveResult<Self> {
        toml::from_str(text).map_err(|e| ArchiveError::Config {
            path: None,
            reason: e.to_string(),
        })
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> ArchiveResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| ArchiveError::Config {
            path: Some(path.to_path_buf()),
            reason: e.to_string(),
        })
    }

    /// Path of the index file for `base_name` in `dir`.
    pub fn index_path(&self, dir: &Path, base_name: &str) -> PathBuf {
        dir.join(format!("{base_name}.{}", self.index_extension))
    }

    /// Path of the blob file for `base_name` in `dir`.
    pub fn blob_path(&self, dir: &Path, base_name: &str) -> PathBuf {
        dir.join(format!("{base_name}.{}", self.blob_extension))
    }

    /// Blob file paired with an index file: same base name, blob extension.
    pub fn blob_path_for(&self, index_path: &Path) -> PathBuf {
        index_path.with_extension(&self.blob_extension)
    }
}
