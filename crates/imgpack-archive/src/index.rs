//! Text index codec.
//!
//! The index file is a single-byte text manifest:
//!
//! ```text
//! 2\r\n
//! button 0 512\r\n
//! button_hover 0 512
//! ```
//!
//! Line 1 holds the decimal entry count, every following line is
//! `name offset length`. Lines are joined with CRLF and there is no trailing
//! line break. Text is Latin-1: every character maps to one byte, and
//! characters above U+00FF are written as `?`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, ArchiveResult};

/// Line separator used when writing an index.
pub const LINE_SEPARATOR: &str = "\r\n";

/// Replacement byte for characters outside Latin-1.
const REPLACEMENT: u8 = b'?';

/// How tolerant index loading is of bad input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Skip malformed lines and truncated entries, reporting them.
    #[default]
    Lenient,
    /// Fail on the first malformed line, truncated entry or count mismatch.
    Strict,
}

/// One `name offset length` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRecord {
    pub name: String,
    pub offset: u64,
    pub length: u32,
}

impl IndexRecord {
    /// Parse a single record line.
    pub fn parse(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [name, offset, length] = fields.as_slice() else {
            return Err(format!("expected 3 fields, found {}", fields.len()));
        };
        let offset = offset
            .parse::<u64>()
            .map_err(|e| format!("invalid offset {offset:?}: {e}"))?;
        let length = length
            .parse::<u32>()
            .map_err(|e| format!("invalid length {length:?}: {e}"))?;
        Ok(Self {
            name: (*name).to_string(),
            offset,
            length,
        })
    }
}

impl fmt::Display for IndexRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.offset, self.length)
    }
}

/// A record together with the 1-based line it was read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatedRecord {
    pub line: usize,
    pub record: IndexRecord,
}

/// A line that was dropped while loading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the index file.
    pub line: usize,
    pub reason: String,
}

/// Everything read from an index file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexContents {
    /// The count from the header line, if one was present.
    pub declared_count: Option<usize>,
    pub records: Vec<LocatedRecord>,
    pub skipped: Vec<SkippedLine>,
}

/// Encode records as index file bytes.
pub fn encode_index(records: &[IndexRecord]) -> Vec<u8> {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(records.len().to_string());
    lines.extend(records.iter().map(IndexRecord::to_string));
    latin1_encode(&lines.join(LINE_SEPARATOR))
}

/// Decode index file bytes.
///
/// Blank lines are ignored in both modes. In lenient mode a first line that
/// is not a bare count is parsed as an ordinary record.
pub fn decode_index(data: &[u8], mode: ParseMode) -> ArchiveResult<IndexContents> {
    let text = latin1_decode(data);
    let mut contents = IndexContents::default();

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }

        if line_no == 1 {
            match parse_count(line) {
                Some(count) => {
                    contents.declared_count = Some(count);
                    continue;
                }
                None if mode == ParseMode::Strict => {
                    return Err(ArchiveError::MalformedIndex {
                        line: 1,
                        reason: format!("expected entry count, found {line:?}"),
                    });
                }
                None => {}
            }
        }

        match IndexRecord::parse(line) {
            Ok(record) => contents.records.push(LocatedRecord {
                line: line_no,
                record,
            }),
            Err(reason) if mode == ParseMode::Strict => {
                return Err(ArchiveError::MalformedIndex {
                    line: line_no,
                    reason,
                });
            }
            Err(reason) => contents.skipped.push(SkippedLine {
                line: line_no,
                reason,
            }),
        }
    }

    if mode == ParseMode::Strict {
        match contents.declared_count {
            Some(count) if count == contents.records.len() => {}
            Some(count) => {
                return Err(ArchiveError::MalformedIndex {
                    line: 1,
                    reason: format!(
                        "declared {count} entries, found {}",
                        contents.records.len()
                    ),
                });
            }
            None => {
                return Err(ArchiveError::MalformedIndex {
                    line: 1,
                    reason: "missing entry count".into(),
                });
            }
        }
    }

    Ok(contents)
}

/// Returns `true` if the name survives a write and re-read of the index.
pub fn is_portable_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| u32::from(c) <= 0xFF && !c.is_whitespace())
}

fn parse_count(line: &str) -> Option<usize> {
    let mut fields = line.split_whitespace();
    let count = fields.next()?.parse().ok()?;
    fields.next().is_none().then_some(count)
}

fn latin1_encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT))
        .collect()
}

fn latin1_decode(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, offset: u64, length: u32) -> IndexRecord {
        IndexRecord {
            name: name.into(),
            offset,
            length,
        }
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    #[test]
    fn encode_uses_count_header_and_crlf() {
        let bytes = encode_index(&[record("img", 0, 4), record("copy", 0, 4)]);
        assert_eq!(bytes, b"2\r\nimg 0 4\r\ncopy 0 4");
    }

    #[test]
    fn encode_empty_index() {
        assert_eq!(encode_index(&[]), b"0");
    }

    #[test]
    fn encode_is_single_byte() {
        let bytes = encode_index(&[record("caf\u{e9}", 0, 1), record("\u{263a}", 1, 1)]);
        assert_eq!(bytes, b"2\r\ncaf\xe9 0 1\r\n? 1 1");
    }

    // -----------------------------------------------------------------------
    // Lenient decoding
    // -----------------------------------------------------------------------

    #[test]
    fn decode_written_index() {
        let bytes = encode_index(&[record("a", 0, 3), record("b", 3, 5)]);
        let contents = decode_index(&bytes, ParseMode::Lenient).unwrap();
        assert_eq!(contents.declared_count, Some(2));
        assert_eq!(contents.records.len(), 2);
        assert_eq!(contents.records[1].line, 3);
        assert_eq!(contents.records[1].record, record("b", 3, 5));
        assert!(contents.skipped.is_empty());
    }

    #[test]
    fn decode_accepts_lf_and_extra_spaces() {
        let contents = decode_index(b"1\n  a   0\t3  \n", ParseMode::Lenient).unwrap();
        assert_eq!(contents.records[0].record, record("a", 0, 3));
    }

    #[test]
    fn lenient_skips_malformed_lines() {
        let data = b"4\r\nok 0 1\r\ntoo few\r\nbad x 1\r\nneg 0 -1\r\n\r\nfine 1 1";
        let contents = decode_index(data, ParseMode::Lenient).unwrap();
        let names: Vec<_> = contents.records.iter().map(|r| r.record.name.as_str()).collect();
        assert_eq!(names, vec!["ok", "fine"]);
        let lines: Vec<_> = contents.skipped.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn lenient_without_header_reads_first_line_as_record() {
        let contents = decode_index(b"a 0 1\r\nb 1 1", ParseMode::Lenient).unwrap();
        assert_eq!(contents.declared_count, None);
        assert_eq!(contents.records.len(), 2);
    }

    #[test]
    fn lenient_ignores_count_mismatch() {
        let contents = decode_index(b"5\r\na 0 1", ParseMode::Lenient).unwrap();
        assert_eq!(contents.declared_count, Some(5));
        assert_eq!(contents.records.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Strict decoding
    // -----------------------------------------------------------------------

    #[test]
    fn strict_accepts_well_formed_index() {
        let bytes = encode_index(&[record("a", 0, 3)]);
        let contents = decode_index(&bytes, ParseMode::Strict).unwrap();
        assert_eq!(contents.records.len(), 1);
    }

    #[test]
    fn strict_rejects_malformed_line() {
        let err = decode_index(b"2\r\na 0 1\r\nb one 1", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedIndex { line: 3, .. }));
    }

    #[test]
    fn strict_requires_header() {
        let err = decode_index(b"a 0 1", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedIndex { line: 1, .. }));
    }

    #[test]
    fn strict_rejects_count_mismatch() {
        let err = decode_index(b"3\r\na 0 1", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedIndex { line: 1, .. }));
    }

    #[test]
    fn strict_rejects_empty_file() {
        let err = decode_index(b"", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedIndex { .. }));
    }

    // -----------------------------------------------------------------------
    // Names
    // -----------------------------------------------------------------------

    #[test]
    fn portable_names() {
        assert!(is_portable_name("button_hover"));
        assert!(is_portable_name("caf\u{e9}"));
        assert!(!is_portable_name(""));
        assert!(!is_portable_name("two words"));
        assert!(!is_portable_name("\u{263a}"));
    }

    #[test]
    fn parse_mode_serde_is_lowercase() {
        let json = serde_json::to_string(&ParseMode::Strict).unwrap();
        assert_eq!(json, "\"strict\"");
        assert_eq!(ParseMode::default(), ParseMode::Lenient);
    }
}
