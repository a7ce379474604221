use std::path::Path;

use aho_corasick::AhoCorasick;
use tracing::warn;

use super::list_source::load_line_list;

/// Static set of substrings that suppress a line before any pattern is tried.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    terms: Vec<String>,
    automaton: Option<AhoCorasick>,
}

impl ExclusionFilter {
    /// Terms are lower-cased once here; blank terms are dropped.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms: Vec<String> = terms
            .into_iter()
            .map(|term| term.as_ref().trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();
        terms.sort();
        terms.dedup();

        let automaton = if terms.is_empty() {
            None
        } else {
            match AhoCorasick::new(&terms) {
                Ok(automaton) => Some(automaton),
                Err(err) => {
                    warn!(error = %err, "failed to build exclusion automaton; using linear search");
                    None
                }
            }
        };
        Self { terms, automaton }
    }

    pub fn load(path: &Path) -> Self {
        Self::new(load_line_list(path))
    }

    /// True iff any term is a case-insensitive substring of `line`.
    pub fn is_excluded(&self, line: &str) -> bool {
        if self.terms.is_empty() {
            return false;
        }
        let lowered = line.to_lowercase();
        match &self.automaton {
            Some(automaton) => automaton.is_match(&lowered),
            None => self.terms.iter().any(|term| lowered.contains(term.as_str())),
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
