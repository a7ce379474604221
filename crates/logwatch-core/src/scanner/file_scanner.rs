use std::{
    collections::VecDeque,
    fs, io,
    ops::ControlFlow,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, error, info, instrument, trace, warn};
use walkdir::WalkDir;

use super::{
    dedup::Deduplicator, exclusion::ExclusionFilter, is_archive, patterns::PatternSet,
    truncate_chars, ExportRecord, FsReader, LossyLines, MatchMode, MatchRecord, ScanError,
    ScanOptions, ScanResult, SourceReader,
};
use crate::{
    audit::AuditLog,
    classifier::{Classifier, Verdict},
};

/// Walks a directory tree and turns matching log lines into records.
pub struct FileScanner {
    classifier: Arc<dyn Classifier>,
    reader: Arc<dyn SourceReader>,
    audit: Option<Arc<AuditLog>>,
}

/// Mutable state for one scan; dropped when the scan returns.
struct ScanState {
    result: ScanResult,
    dedup: Deduplicator,
}

impl FileScanner {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            reader: Arc::new(FsReader),
            audit: None,
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn SourceReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Scan every regular file under `root`, following symlinks.
    ///
    /// Only an inaccessible root fails the scan; unreadable files and classifier
    /// errors are logged and skipped.
    #[instrument(name = "scan_tree", skip_all, fields(root = %root.display(), mode = ?options.mode))]
    pub async fn scan(
        &self,
        root: &Path,
        patterns: &PatternSet,
        exclusions: &ExclusionFilter,
        options: &ScanOptions,
    ) -> Result<ScanResult, ScanError> {
        let files = enumerate_files(root)?;
        debug!(candidates = files.len(), "enumerated scan tree");

        let mut state = ScanState {
            result: ScanResult::default(),
            dedup: Deduplicator::new(),
        };
        let mut opened = 0usize;

        for path in files {
            if is_archive(&path) {
                trace!(path = %path.display(), "skipping archive");
                state.result.files_skipped += 1;
                continue;
            }

            opened += 1;
            let flow = self
                .scan_file(&path, patterns, exclusions, options, &mut state)
                .await;
            if flow.is_break() {
                info!(
                    limit = options.context_match_limit,
                    "context match limit reached; ending scan early"
                );
                break;
            }

            if options.test_mode
                && opened >= options.test_mode_file_limit
                && !state.result.records.is_empty()
            {
                info!(files = opened, "test mode file limit reached; ending scan early");
                break;
            }
        }

        debug!(
            records = state.result.records.len(),
            scanned = state.result.files_scanned,
            skipped = state.result.files_skipped,
            failed = state.result.files_failed,
            "scan completed"
        );
        Ok(state.result)
    }

    /// Stream one file through the active mode. Read failures end this file only.
    async fn scan_file(
        &self,
        path: &Path,
        patterns: &PatternSet,
        exclusions: &ExclusionFilter,
        options: &ScanOptions,
        state: &mut ScanState,
    ) -> ControlFlow<()> {
        let stream = match self.reader.open(path) {
            Ok(stream) => stream,
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to open file; skipping");
                state.result.files_failed += 1;
                return ControlFlow::Continue(());
            }
        };
        state.result.files_scanned += 1;
        let lines = LossyLines::new(stream);

        let outcome = match options.mode {
            MatchMode::Pattern => {
                self.scan_patterns(path, lines, patterns, exclusions, options, state)
                    .await
            }
            MatchMode::Context => {
                self.scan_context(path, lines, exclusions, options, state)
                    .await
            }
        };
        outcome.unwrap_or_else(|err| {
            error!(path = %path.display(), error = %err, "failed while reading file; skipping rest");
            state.result.files_failed += 1;
            ControlFlow::Continue(())
        })
    }

    async fn scan_patterns<I>(
        &self,
        path: &Path,
        lines: I,
        patterns: &PatternSet,
        exclusions: &ExclusionFilter,
        options: &ScanOptions,
        state: &mut ScanState,
    ) -> io::Result<ControlFlow<()>>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        for (idx, line) in lines.enumerate() {
            let line = line?;
            let line_number = idx + 1;
            if exclusions.is_excluded(&line) {
                continue;
            }
            let Some(hit) = patterns.match_first(&line) else {
                continue;
            };
            self.audit(path, line_number, &line, Some(hit.source));

            if !self.verdict_for(hit.matched).await.is_true_positive() {
                trace!(path = %path.display(), line_number, "discarding false positive");
                continue;
            }

            let value = truncate_chars(hit.matched, options.max_match_chars);
            if !state.dedup.record(&value) {
                continue;
            }
            state.result.exports.push(ExportRecord {
                path: path.to_path_buf(),
                line_number,
                original_line: line.trim().to_string(),
                flagged: value.clone(),
            });
            state.result.records.push(MatchRecord {
                path: path.to_path_buf(),
                line_number,
                content: value,
                pattern: Some(hit.source.to_string()),
            });
        }
        Ok(ControlFlow::Continue(()))
    }

    async fn scan_context<I>(
        &self,
        path: &Path,
        lines: I,
        exclusions: &ExclusionFilter,
        options: &ScanOptions,
        state: &mut ScanState,
    ) -> io::Result<ControlFlow<()>>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        let mut window = ContextWindow::new(options.context_radius);
        for line in lines {
            window.push(line?);
            if self
                .drain_window(path, &mut window, exclusions, options, state)
                .await
                .is_break()
            {
                return Ok(ControlFlow::Break(()));
            }
        }
        window.finish();
        if self
            .drain_window(path, &mut window, exclusions, options, state)
            .await
            .is_break()
        {
            return Ok(ControlFlow::Break(()));
        }
        if state.result.records.len() >= options.context_match_limit {
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Classify every buffered line that has its trailing context available.
    async fn drain_window(
        &self,
        path: &Path,
        window: &mut ContextWindow,
        exclusions: &ExclusionFilter,
        options: &ScanOptions,
        state: &mut ScanState,
    ) -> ControlFlow<()> {
        while let Some((line_number, line)) = window.current() {
            if state.result.records.len() >= options.context_match_limit {
                return ControlFlow::Break(());
            }
            if !exclusions.is_excluded(line) {
                self.audit(path, line_number, line, None);
                if self.verdict_for(line).await.is_true_positive() {
                    let block = window.block();
                    state.result.exports.push(ExportRecord {
                        path: path.to_path_buf(),
                        line_number,
                        original_line: line.trim().to_string(),
                        flagged: block.clone(),
                    });
                    state.result.records.push(MatchRecord {
                        path: path.to_path_buf(),
                        line_number,
                        content: block,
                        pattern: None,
                    });
                }
            }
            window.advance();
        }
        ControlFlow::Continue(())
    }

    /// Classifier failures resolve to a false positive for that one call.
    async fn verdict_for(&self, text: &str) -> Verdict {
        match self.classifier.classify(text).await {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(error = %err, "classifier call failed; treating as false positive");
                Verdict::FalsePositive
            }
        }
    }

    fn audit(&self, path: &Path, line_number: usize, line: &str, pattern: Option<&str>) {
        if let Some(audit) = &self.audit {
            audit.record(path, line_number, line, pattern);
        }
    }
}

/// Sliding view over a file: up to `radius` lines behind the line under test
/// and `radius` lines ahead of it.
#[derive(Debug)]
struct ContextWindow {
    lines: VecDeque<String>,
    radius: usize,
    /// 1-based line number of `lines[0]`.
    first_number: usize,
    /// Index in `lines` of the next line to classify.
    cursor: usize,
    at_eof: bool,
}

impl ContextWindow {
    fn new(radius: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(2 * radius + 1),
            radius,
            first_number: 1,
            cursor: 0,
            at_eof: false,
        }
    }

    fn push(&mut self, line: String) {
        self.lines.push_back(line);
    }

    fn finish(&mut self) {
        self.at_eof = true;
    }

    /// Line under test once its trailing context is buffered or the file has ended.
    fn current(&self) -> Option<(usize, &str)> {
        let line = self.lines.get(self.cursor)?;
        let ahead = self.lines.len() - self.cursor - 1;
        (ahead >= self.radius || self.at_eof)
            .then(|| (self.first_number + self.cursor, line.as_str()))
    }

    /// Lines `current - radius ..= current + radius`, clamped to the file, joined with `\n`.
    fn block(&self) -> String {
        let start = self.cursor.saturating_sub(self.radius);
        let end = (self.cursor + self.radius).min(self.lines.len().saturating_sub(1));
        self.lines
            .range(start..=end)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn advance(&mut self) {
        self.cursor += 1;
        while self.cursor > self.radius {
            self.lines.pop_front();
            self.first_number += 1;
            self.cursor -= 1;
        }
    }
}

fn enumerate_files(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let metadata = fs::metadata(root).map_err(|source| ScanError::RootUnavailable {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to enumerate entry; skipping"),
        }
    }
    Ok(files)
}
