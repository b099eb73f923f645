//! Report output
//!
//! [`render`] turns a [`Report`](crate::types::Report) into text or JSON;
//! [`write_report`] puts that text on disk without ever leaving a partial file
//! behind.

pub mod render;

pub use render::{recommendations, render_json, render_report, render_waterfall};

use crate::error::{Error, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `text` to `path` atomically.
///
/// The text goes to a temporary file in the destination directory, which is
/// then renamed over `path`. On failure the destination is left untouched.
pub fn write_report(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let output_error = |source: std::io::Error| Error::Output {
        path: path.to_path_buf(),
        source,
    };

    let mut file = NamedTempFile::new_in(dir).map_err(output_error)?;
    file.write_all(text.as_bytes()).map_err(output_error)?;
    file.as_file().sync_all().map_err(output_error)?;
    file.persist(path).map_err(|e| output_error(e.error))?;

    tracing::info!(path = %path.display(), bytes = text.len(), "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_report_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");

        write_report(&path, "hello\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");

        // Overwrites in place.
        write_report(&path, "again\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "again\n");
    }

    #[test]
    fn test_write_report_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/report.txt");

        let err = write_report(&path, "hello\n").unwrap_err();
        assert!(matches!(err, Error::Output { .. }));
        assert!(err.to_string().contains("report.txt"));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_report_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        write_report(&dir.path().join("r.txt"), "x").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
