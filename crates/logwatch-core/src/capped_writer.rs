use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

/// Default cap for both the operational and the audit log.
pub const DEFAULT_MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

/// Append-only file that starts over from empty once a write would exceed `max_size`.
///
/// No backups are kept: the file always holds the most recent stretch of output.
#[derive(Debug)]
pub struct CappedFileWriter {
    path: PathBuf,
    max_size: u64,
    file: File,
    current_size: u64,
}

impl CappedFileWriter {
    pub fn open(path: impl Into<PathBuf>, max_size: u64) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let current_size = file.metadata()?.len();
        let mut writer = Self {
            path,
            max_size: max_size.max(1),
            file,
            current_size,
        };
        if writer.current_size > writer.max_size {
            writer.truncate()?;
        }
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    fn truncate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.set_len(0)?;
        self.current_size = 0;
        Ok(())
    }
}

impl Write for CappedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size > 0 && self.current_size + buf.len() as u64 > self.max_size {
            self.truncate()?;
        }
        let bytes = self.file.write(buf)?;
        self.current_size += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_until_cap_then_starts_over() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("logs/app.log");
        let mut writer = CappedFileWriter::open(&path, 16).unwrap();
        writer.write_all(b"0123456789").unwrap();
        writer.write_all(b"abcde").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0123456789abcde");

        writer.write_all(b"XYZ").unwrap();
        writer.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "XYZ");
        assert_eq!(writer.current_size(), 3);
    }

    #[test]
    fn oversized_existing_file_is_truncated_on_open() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("big.log");
        fs::write(&path, vec![b'x'; 64]).unwrap();
        let writer = CappedFileWriter::open(&path, 32).unwrap();
        assert_eq!(writer.current_size(), 0);
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }
}
