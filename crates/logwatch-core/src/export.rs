use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scanner::ExportRecord;

/// Sink that persists one structured row per accepted match.
pub trait RecordExporter: Send + Sync {
    /// Write `records` to a new artifact for the cycle started at `cycle_started`.
    fn export(&self, cycle_started: DateTime<Utc>, records: &[ExportRecord]) -> Result<PathBuf>;
}

/// Writes each cycle's records to its own CSV file under `dir`.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    file: String,
    line: usize,
    original_line: &'a str,
    flagged: &'a str,
    label: &'a str,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a file that did not exist before, suffixing a counter on collision.
    fn create_unique(&self, stem: &str) -> Result<(PathBuf, fs::File)> {
        for attempt in 0u32.. {
            let path = self.dir.join(format!("{stem}_{attempt}.csv"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to create export file {}", path.display()))
                }
            }
        }
        Err(anyhow!("no free export file name for {stem} in {}", self.dir.display()))
    }
}

impl RecordExporter for CsvExporter {
    fn export(&self, cycle_started: DateTime<Utc>, records: &[ExportRecord]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create export directory {}", self.dir.display())
        })?;
        let stem = format!("matches_{}", cycle_started.format("%Y%m%d_%H%M%S"));
        let (path, file) = self.create_unique(&stem)?;

        let mut writer = csv::Writer::from_writer(file);
        for record in records {
            writer
                .serialize(CsvRow {
                    file: record.path.display().to_string(),
                    line: record.line_number,
                    original_line: &record.original_line,
                    flagged: &record.flagged,
                    label: "",
                })
                .with_context(|| format!("failed to write export row to {}", path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to flush export file {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn records() -> Vec<ExportRecord> {
        vec![
            ExportRecord {
                path: PathBuf::from("/logs/a.log"),
                line_number: 2,
                original_line: "2024-01-01 ERROR disk full".into(),
                flagged: "ERROR".into(),
            },
            ExportRecord {
                path: PathBuf::from("/logs/b.log"),
                line_number: 2,
                original_line: "2024-01-01 ERROR disk full".into(),
                flagged: "ERROR, again".into(),
            },
        ]
    }

    #[test]
    fn writes_header_and_one_row_per_record() {
        let temp = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(temp.path().join("exports"));
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 5).unwrap();

        let path = exporter.export(started, &records()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "matches_20240101_123005_0.csv"
        );
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "file,line,original_line,flagged,label");
        assert_eq!(lines[1], "/logs/a.log,2,2024-01-01 ERROR disk full,ERROR,");
        assert_eq!(lines[2], "/logs/b.log,2,2024-01-01 ERROR disk full,\"ERROR, again\",");
    }

    #[test]
    fn never_overwrites_previous_exports() {
        let temp = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(temp.path());
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let first = exporter.export(started, &records()).unwrap();
        let second = exporter.export(started, &records()[..1]).unwrap();
        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap().lines().count(), 3);
        assert_eq!(fs::read_to_string(&second).unwrap().lines().count(), 2);
    }
}
