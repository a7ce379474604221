//! The flat `key=value` file re-read at the start of every cycle.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;
use tracing::warn;

use crate::{
    digest::DEFAULT_MAX_DIGEST_RECORDS,
    notify::DEFAULT_SUBJECT,
    scanner::{
        MatchMode, ScanOptions, DEFAULT_CONTEXT_MATCH_LIMIT, DEFAULT_TEST_MODE_FILE_LIMIT,
    },
};

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(600);

/// Reasons a cycle cannot run with the current configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read watch config `{}`: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("watch config has no `directory`")]
    MissingDirectory,
    #[error("no patterns configured")]
    NoPatterns,
    #[error("no notification recipients configured")]
    NoRecipients,
}

/// Parsed watch configuration. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub directory: Option<PathBuf>,
    pub recipients: Vec<String>,
    pub scan_interval: Duration,
    pub debug: u8,
    pub export: bool,
    pub test_mode: bool,
    pub inline_pattern: Option<String>,
    pub mode: MatchMode,
    pub max_digest_records: usize,
    pub test_mode_file_limit: usize,
    pub context_match_limit: usize,
    pub subject: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: None,
            recipients: Vec::new(),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            debug: 0,
            export: false,
            test_mode: false,
            inline_pattern: None,
            mode: MatchMode::Pattern,
            max_digest_records: DEFAULT_MAX_DIGEST_RECORDS,
            test_mode_file_limit: DEFAULT_TEST_MODE_FILE_LIMIT,
            context_match_limit: DEFAULT_CONTEXT_MATCH_LIMIT,
            subject: DEFAULT_SUBJECT.to_string(),
        }
    }
}

impl WatchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        Self::from_pairs(&parse_pairs(content))
    }

    fn from_pairs(pairs: &HashMap<String, String>) -> Self {
        let get = |keys: &[&str]| {
            keys.iter().find_map(|key| {
                pairs
                    .get(*key)
                    .map(String::as_str)
                    .filter(|v| !v.is_empty())
            })
        };
        let mut config = Self::default();

        config.directory = get(&["directory"]).map(PathBuf::from);
        config.recipients = get(&["emails", "recipients"])
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(raw) = get(&["scan_interval"]) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.scan_interval = Duration::from_secs(secs),
                _ => warn!(value = raw, "invalid scan_interval; using default"),
            }
        }
        config.debug = get(&["debug"])
            .and_then(|raw| raw.parse::<u8>().ok())
            .unwrap_or(0);
        config.export = get(&["save_to_CSV", "export"]).is_some_and(parse_flag);
        config.test_mode = get(&["test_mode"]).is_some_and(parse_flag);
        config.inline_pattern = get(&["patterns"]).map(str::to_string);
        if let Some(raw) = get(&["mode"]) {
            match MatchMode::parse(raw) {
                Some(mode) => config.mode = mode,
                None => warn!(value = raw, "unknown mode; using pattern mode"),
            }
        }
        config.max_digest_records =
            parse_count(get(&["max_digest_records"]), DEFAULT_MAX_DIGEST_RECORDS);
        config.test_mode_file_limit =
            parse_count(get(&["test_mode_file_limit"]), DEFAULT_TEST_MODE_FILE_LIMIT);
        config.context_match_limit =
            parse_count(get(&["context_match_limit"]), DEFAULT_CONTEXT_MATCH_LIMIT);
        if let Some(subject) = get(&["subject"]) {
            config.subject = subject.to_string();
        }
        config
    }

    /// Check the keys a cycle cannot run without, given how many patterns loaded.
    ///
    /// At least one pattern is required in every mode.
    pub fn validate(&self, pattern_count: usize) -> Result<&Path, ConfigError> {
        let directory = self
            .directory
            .as_deref()
            .ok_or(ConfigError::MissingDirectory)?;
        if pattern_count == 0 {
            return Err(ConfigError::NoPatterns);
        }
        if self.recipients.is_empty() {
            return Err(ConfigError::NoRecipients);
        }
        Ok(directory)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            mode: self.mode,
            test_mode: self.test_mode,
            test_mode_file_limit: self.test_mode_file_limit,
            context_match_limit: self.context_match_limit,
            ..ScanOptions::default()
        }
    }
}

/// Split `key=value` lines; comments and lines without `=` are ignored, later keys win.
pub fn parse_pairs(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_count(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
