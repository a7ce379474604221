use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use super::{list_source::load_line_list, PatternError};

/// A hit produced by [`PatternSet::match_first`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch<'a> {
    /// Group 0 of the first matching pattern.
    pub matched: &'a str,
    /// Source text of the pattern that produced the match.
    pub source: &'a str,
}

/// Case-insensitive regular expressions keyed by their source text.
///
/// Iteration is lexicographic by source, so a line matching several patterns is
/// always attributed to the same one.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: BTreeMap<String, Regex>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge every listed pattern file. Missing or unreadable files contribute nothing.
    pub fn load(sources: &[PathBuf]) -> Self {
        let mut set = Self::new();
        for path in sources {
            set.extend_from_file(path);
        }
        debug!(patterns = set.len(), "pattern set loaded");
        set
    }

    /// Build a set from in-memory sources, skipping entries that fail to compile.
    pub fn from_sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for source in sources {
            if let Err(err) = set.insert(source.as_ref()) {
                warn!(error = %err, "skipping pattern");
            }
        }
        set
    }

    fn extend_from_file(&mut self, path: &Path) {
        for source in load_line_list(path) {
            if let Err(err) = self.insert(&source) {
                warn!(path = %path.display(), error = %err, "skipping pattern entry");
            }
        }
    }

    /// Compile and add one pattern. Returns `false` when the source was already present.
    pub fn insert(&mut self, source: &str) -> Result<bool, PatternError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(PatternError::EmptySource);
        }
        if self.patterns.contains_key(source) {
            return Ok(false);
        }
        let regex = compile(source)?;
        self.patterns.insert(source.to_string(), regex);
        Ok(true)
    }

    /// First pattern (in source order) that matches anywhere in `line`.
    pub fn match_first<'a>(&'a self, line: &'a str) -> Option<PatternMatch<'a>> {
        self.patterns.iter().find_map(|(source, regex)| {
            regex.find(line).map(|found| PatternMatch {
                matched: found.as_str(),
                source: source.as_str(),
            })
        })
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn compile(source: &str) -> Result<Regex, PatternError> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|err| PatternError::InvalidRegex {
            source_text: source.to_string(),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn merges_default_and_custom_files() {
        let temp = tempfile::tempdir().unwrap();
        let default = temp.path().join("default.txt");
        let custom = temp.path().join("custom.txt");
        write(&default, "# defaults\nERROR\nfatal\n");
        write(&custom, "\nERROR\nout of memory\n");

        let set = PatternSet::load(&[default, custom]);
        let sources: Vec<_> = set.sources().collect();
        assert_eq!(sources, vec!["ERROR", "fatal", "out of memory"]);
    }

    #[test]
    fn missing_file_contributes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let present = temp.path().join("default.txt");
        write(&present, "panic\n");
        let set = PatternSet::load(&[present, temp.path().join("custom.txt")]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let set = PatternSet::from_sources(["(unclosed", "timeout"]);
        assert_eq!(set.sources().collect::<Vec<_>>(), vec!["timeout"]);
    }

    #[test]
    fn insert_rejects_blank_and_reports_duplicates() {
        let mut set = PatternSet::new();
        assert_eq!(set.insert("   "), Err(PatternError::EmptySource));
        assert_eq!(set.insert("error"), Ok(true));
        assert_eq!(set.insert(" error "), Ok(false));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn matching_is_case_insensitive_and_returns_group_zero() {
        let set = PatternSet::from_sources([r"disk \w+"]);
        let hit = set.match_first("2024-01-01 DISK FULL on /var").unwrap();
        assert_eq!(hit.matched, "DISK FULL");
        assert_eq!(hit.source, r"disk \w+");
    }

    #[test]
    fn attribution_follows_source_order() {
        let set = PatternSet::from_sources(["full", "disk", "ERROR"]);
        let hit = set.match_first("ERROR disk full").unwrap();
        assert_eq!(hit.source, "ERROR");
        let hit = set.match_first("disk full").unwrap();
        assert_eq!(hit.source, "disk");
    }

    #[test]
    fn loads_sample_pattern_pack_from_repo() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../patterns")
            .canonicalize()
            .expect("patterns directory should exist");
        let set = PatternSet::load(&[root.join("default.txt"), root.join("custom.txt")]);
        assert!(set.len() >= 5, "default.txt should provide the stock patterns");
        let hit = set
            .match_first("2024-01-01 kernel: Out Of Memory: killed process 42")
            .expect("stock patterns should flag OOM");
        assert_eq!(hit.matched, "Out Of Memory");

        let exclusions = crate::scanner::exclusion::ExclusionFilter::load(&root.join("exclusions.txt"));
        assert!(exclusions.is_excluded("GET /HealthCheck 200"));
    }

    proptest! {
        #[test]
        fn literal_patterns_always_match_their_own_text(word in "[A-Za-z]{3,16}") {
            let set = PatternSet::from_sources([regex::escape(&word)]);
            let line = format!("prefix {} suffix", word.to_uppercase());
            let hit = set.match_first(&line);
            prop_assert!(hit.is_some());
            prop_assert_eq!(hit.unwrap().matched.to_lowercase(), word.to_lowercase());
        }
    }
}
