use std::{fs, io, path::Path};

use tracing::{debug, error, warn};

/// Read a newline list (patterns or exclusions), dropping blank lines and `#` comments.
///
/// A missing file contributes nothing and logs a warning; any other read error
/// is logged and likewise treated as empty.
pub fn load_line_list(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let entries = parse_line_list(&content);
            debug!(path = %path.display(), entries = entries.len(), "loaded list file");
            entries
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "list file not found; treating as empty");
            Vec::new()
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to read list file; treating as empty");
            Vec::new()
        }
    }
}

/// Parse list-file content already in memory.
pub fn parse_line_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
