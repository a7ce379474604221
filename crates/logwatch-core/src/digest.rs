use std::{
    collections::HashMap,
    fmt::Write,
    path::{Path, PathBuf},
};

use crate::scanner::MatchRecord;

pub const DEFAULT_MAX_DIGEST_RECORDS: usize = 100;
const HEADER: &str = "The following lines matched your patterns:";

/// Where the digest should point readers for results beyond the cap.
#[derive(Debug, Clone)]
pub struct DigestOptions {
    pub max_records: usize,
    pub audit_log: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_DIGEST_RECORDS,
            audit_log: None,
            export_dir: None,
        }
    }
}

/// Rendered notification body for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub body: String,
    pub shown: usize,
    pub total: usize,
}

impl Digest {
    pub fn is_truncated(&self) -> bool {
        self.shown < self.total
    }
}

/// Group records by file (first-seen order) and render the body.
///
/// Returns `None` for an empty input so callers skip notification entirely.
pub fn build_digest(
    records: &[MatchRecord],
    options: &DigestOptions,
) -> anyhow::Result<Option<Digest>> {
    if records.is_empty() {
        return Ok(None);
    }

    let kept = &records[..records.len().min(options.max_records)];
    let groups = group_by_file(kept);

    let mut out = String::new();
    writeln!(out, "{HEADER}")?;
    for (path, group) in &groups {
        writeln!(out)?;
        writeln!(out, "File: {}", path.display())?;
        for record in group {
            writeln!(
                out,
                "{}: {}",
                record.line_number,
                indent_continuation(&record.content)
            )?;
        }
    }

    if kept.len() < records.len() {
        writeln!(out)?;
        write!(
            out,
            "Showing {} of {} matches.",
            kept.len(),
            records.len()
        )?;
        if let Some(audit) = &options.audit_log {
            write!(out, " The full list is in the audit log at {}", audit.display())?;
            if let Some(dir) = &options.export_dir {
                write!(out, "; exported records are in {}", dir.display())?;
            }
            write!(out, ".")?;
        } else if let Some(dir) = &options.export_dir {
            write!(out, " Exported records are in {}.", dir.display())?;
        }
        writeln!(out)?;
    }

    Ok(Some(Digest {
        body: out,
        shown: kept.len(),
        total: records.len(),
    }))
}

fn group_by_file(records: &[MatchRecord]) -> Vec<(&Path, Vec<&MatchRecord>)> {
    let mut index: HashMap<&Path, usize> = HashMap::new();
    let mut groups: Vec<(&Path, Vec<&MatchRecord>)> = Vec::new();
    for record in records {
        let slot = *index.entry(record.path.as_path()).or_insert_with(|| {
            groups.push((record.path.as_path(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(record);
    }
    groups
}

fn indent_continuation(content: &str) -> String {
    content.replace('\n', "\n    ")
}
