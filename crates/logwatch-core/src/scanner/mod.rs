use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod dedup;
pub mod exclusion;
pub mod file_scanner;
/// Newline-delimited list files shared by pattern and exclusion loading.
pub mod list_source;
pub mod patterns;

/// File-name suffixes that mark compressed or archived content the scanner never opens.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".bz2", ".gz", ".xz", ".7z", ".tar", ".rar"];

/// Longest matched value (in characters) kept on a record in pattern mode.
pub const DEFAULT_MAX_MATCH_CHARS: usize = 200;
/// Lines included on each side of a context-mode hit.
pub const DEFAULT_CONTEXT_RADIUS: usize = 3;
/// Ceiling on accepted context-mode matches per scan.
pub const DEFAULT_CONTEXT_MATCH_LIMIT: usize = 20;
/// Files opened per scan when test mode is enabled.
pub const DEFAULT_TEST_MODE_FILE_LIMIT: usize = 5;

/// Matching strategy applied to every non-excluded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Regex first pass, classifier on the matched span, dedup by value.
    #[default]
    Pattern,
    /// Classifier on every line, report a window of surrounding lines.
    Context,
}

impl MatchMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pattern" => Some(Self::Pattern),
            "context" => Some(Self::Context),
            _ => None,
        }
    }
}

/// One accepted hit inside a scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub path: PathBuf,
    /// 1-based position of the line inside `path`.
    pub line_number: usize,
    /// Matched value (pattern mode) or joined context window (context mode).
    pub content: String,
    /// Source text of the attributing pattern; `None` in context mode.
    pub pattern: Option<String>,
}

/// Row handed to the export sink, identified by `(path, line_number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub path: PathBuf,
    pub line_number: usize,
    pub original_line: String,
    pub flagged: String,
}

/// Everything a scan produced for one cycle.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Traversal order, then ascending line order within each file.
    pub records: Vec<MatchRecord>,
    pub exports: Vec<ExportRecord>,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Knobs for a single scan invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub mode: MatchMode,
    pub test_mode: bool,
    pub test_mode_file_limit: usize,
    pub context_match_limit: usize,
    pub context_radius: usize,
    pub max_match_chars: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            mode: MatchMode::Pattern,
            test_mode: false,
            test_mode_file_limit: DEFAULT_TEST_MODE_FILE_LIMIT,
            context_match_limit: DEFAULT_CONTEXT_MATCH_LIMIT,
            context_radius: DEFAULT_CONTEXT_RADIUS,
            max_match_chars: DEFAULT_MAX_MATCH_CHARS,
        }
    }
}

/// Errors that abort a whole scan. Per-file failures never surface here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan root `{}` is not accessible: {source}", path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("scan root `{}` is not a directory", path.display())]
    NotADirectory { path: PathBuf },
}

/// Errors raised while compiling a single pattern entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern source must not be blank")]
    EmptySource,
    #[error("pattern `{source_text}` is not a valid regular expression: {message}")]
    InvalidRegex {
        source_text: String,
        message: String,
    },
}

/// Buffered byte stream for one scanned file.
pub type SourceStream = Box<dyn BufRead + Send>;

/// Abstraction over opening a scanned file so callers can substitute in-memory or counting readers.
pub trait SourceReader: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<SourceStream>;
}

/// Opens files straight from the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl SourceReader for FsReader {
    fn open(&self, path: &Path) -> io::Result<SourceStream> {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

/// Line iterator that replaces malformed UTF-8 instead of failing.
///
/// Only the current line is held in memory. `\n` and `\r\n` terminators are stripped.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// True when the file name carries a known archive/compressed suffix.
pub fn is_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| {
            let lower = name.to_ascii_lowercase();
            ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .unwrap_or(false)
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_suffixes_are_case_insensitive() {
        assert!(is_archive(Path::new("/var/log/data.gz")));
        assert!(is_archive(Path::new("backup.TAR")));
        assert!(is_archive(Path::new("nested/app.log.7z")));
        assert!(!is_archive(Path::new("app.log")));
        assert!(!is_archive(Path::new("gzip-notes.txt")));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn match_mode_parses_known_values() {
        assert_eq!(MatchMode::parse(" Context "), Some(MatchMode::Context));
        assert_eq!(MatchMode::parse("pattern"), Some(MatchMode::Pattern));
        assert_eq!(MatchMode::parse("fuzzy"), None);
    }

    #[test]
    fn lossy_lines_replace_invalid_utf8() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("binary.log");
        std::fs::write(&path, b"ok \xff\xfe ERROR\nnext").unwrap();
        let lines: Vec<String> = LossyLines::new(FsReader.open(&path).unwrap())
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ERROR"));
        assert!(lines[0].contains('\u{FFFD}'));
        assert_eq!(lines[1], "next");
    }

    #[test]
    fn lossy_lines_strip_crlf_and_keep_blank_lines() {
        let lines: Vec<String> = LossyLines::new(&b"first\r\n\nthird\n"[..])
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["first", "", "third"]);
    }
}
