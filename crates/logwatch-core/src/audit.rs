use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{SecondsFormat, Utc};
use tracing::warn;

use crate::capped_writer::CappedFileWriter;

/// Write-only record of every raw match, independent of classification or dedup.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    writer: Mutex<CappedFileWriter>,
}

impl AuditLog {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64) -> io::Result<Self> {
        let path = path.into();
        let writer = CappedFileWriter::open(&path, max_bytes)?;
        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line. Failures are logged and swallowed; the audit trail never stops a scan.
    pub fn record(&self, file: &Path, line_number: usize, content: &str, pattern: Option<&str>) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut line = format!(
            "{timestamp} {}:{line_number}: {}",
            file.display(),
            content.trim()
        );
        if let Some(pattern) = pattern {
            line.push_str(" pattern=");
            line.push_str(pattern);
        }
        line.push('\n');

        let result = match self.writer.lock() {
            Ok(mut writer) => writer
                .write_all(line.as_bytes())
                .and_then(|()| writer.flush()),
            Err(_) => Err(io::Error::new(io::ErrorKind::Other, "audit writer lock poisoned")),
        };
        if let Err(err) = result {
            warn!(path = %self.path.display(), error = %err, "failed to append to audit log");
        }
    }
}
