//! Log reader
//!
//! Streams a log file (or an in-memory blob) as [`LogLine`]s. The reader never
//! fails: a missing file yields no lines, a line with invalid UTF-8 is skipped,
//! and both are recorded as [`ReadIssue`]s for the report.
//!
//! The file is read up to its current end. A log that is still being appended
//! to by the pipeline is analyzed as far as it has been written.

use crate::ingest::timestamp::LogClock;
use crate::types::{Finding, LogLine, Severity};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

/// Detector name used for findings raised while reading.
pub const READER_FINDING_SOURCE: &str = "reader";

/// A problem encountered while reading the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadIssue {
    /// The log could not be opened at all
    Open { path: String, message: String },
    /// A line was not valid UTF-8 and was skipped
    Decode { line_number: u64 },
    /// Reading stopped early
    Io { line_number: u64, message: String },
}

impl ReadIssue {
    /// Convert to a report finding.
    pub fn to_finding(&self) -> Finding {
        match self {
            ReadIssue::Open { path, message } => Finding::new(
                READER_FINDING_SOURCE,
                Severity::Critical,
                format!("Failed to read log file {}: {}", path, message),
                vec![],
            ),
            ReadIssue::Decode { line_number } => Finding::new(
                READER_FINDING_SOURCE,
                Severity::Warning,
                format!("Line {} is not valid UTF-8 and was skipped", line_number),
                vec![*line_number],
            ),
            ReadIssue::Io {
                line_number,
                message,
            } => Finding::new(
                READER_FINDING_SOURCE,
                Severity::Warning,
                format!(
                    "Reading stopped after line {}: {}",
                    line_number.saturating_sub(1),
                    message
                ),
                vec![],
            ),
        }
    }
}

/// Lazy line source over a log.
///
/// Iterate it (usually through `by_ref()`), then collect issues with
/// [`LogReader::into_issues`].
pub struct LogReader {
    source: Option<Box<dyn BufRead>>,
    clock: LogClock,
    line_number: u64,
    issues: Vec<ReadIssue>,
    buf: Vec<u8>,
}

impl LogReader {
    /// Open a log file. Failure to open is recorded, not returned.
    pub fn open(path: &Path) -> Self {
        match File::open(path) {
            Ok(file) => {
                tracing::debug!(path = %path.display(), "Opened log file");
                Self::with_source(Some(Box::new(BufReader::new(file))))
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to open log file");
                let mut reader = Self::with_source(None);
                reader.issues.push(ReadIssue::Open {
                    path: path.display().to_string(),
                    message: e.to_string(),
                });
                reader
            }
        }
    }

    /// Read from an in-memory text blob.
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes().to_vec())
    }

    /// Read from raw bytes, which may contain invalid UTF-8.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::with_source(Some(Box::new(Cursor::new(bytes))))
    }

    fn with_source(source: Option<Box<dyn BufRead>>) -> Self {
        Self {
            source,
            clock: LogClock::new(),
            line_number: 0,
            issues: Vec::new(),
            buf: Vec::new(),
        }
    }

    /// Number of lines consumed so far, including skipped ones
    pub fn lines_read(&self) -> u64 {
        self.line_number
    }

    /// Issues recorded so far
    pub fn issues(&self) -> &[ReadIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ReadIssue> {
        self.issues
    }
}

impl Iterator for LogReader {
    type Item = LogLine;

    fn next(&mut self) -> Option<LogLine> {
        loop {
            let source = self.source.as_mut()?;

            self.buf.clear();
            match source.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.source = None;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.issues.push(ReadIssue::Io {
                        line_number: self.line_number + 1,
                        message: e.to_string(),
                    });
                    self.source = None;
                    return None;
                }
            }

            self.line_number += 1;

            while matches!(self.buf.last(), Some(b'\n') | Some(b'\r')) {
                self.buf.pop();
            }

            let text = match std::str::from_utf8(&self.buf) {
                Ok(text) => text.to_string(),
                Err(_) => {
                    tracing::debug!(line = self.line_number, "Skipping line with invalid UTF-8");
                    self.issues.push(ReadIssue::Decode {
                        line_number: self.line_number,
                    });
                    continue;
                }
            };

            let (timestamp, body_start) = self.clock.parse(&text);

            return Some(LogLine {
                line_number: self.line_number,
                raw_text: text,
                timestamp,
                body_start,
            });
        }
    }
}
