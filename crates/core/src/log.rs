//! Run log.
//!
//! Every notable event of a run (skipped folder, unreadable header, summary) is
//! recorded as a timestamped [`LogEntry`]. Entries are mirrored to `tracing` as
//! they happen and appended to `ExtractDicomInfo.log` when the run finishes.
//!
//! Line format:
//!
//! ```text
//! 2026-03-02 14:05:09,417 - WARNING - BPX: folder name does not match any subject naming scheme; skipped
//! ```

use crate::{SurveyError, SurveyResult};
use chrono::{DateTime, Local};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Renders the entry as one line of the log file, without the newline.
    pub fn to_line(&self) -> String {
        format!(
            "{} - {} - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
            self.level,
            self.message
        )
    }
}

/// Append-only sequence of log entries for a single run.
#[derive(Clone, Debug, Default)]
pub struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    fn push(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
        self.entries.push(LogEntry {
            timestamp: Local::now(),
            level,
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose message mentions `needle`.
    pub fn mentioning<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.entries.iter().filter(move |e| e.message.contains(needle))
    }

    /// Appends every entry to the log file at `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `SurveyError::LogWrite` if the file cannot be opened or written.
    pub fn append_to(&self, path: &Path) -> SurveyResult<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(SurveyError::LogWrite)?;

        let mut writer = BufWriter::new(file);
        for entry in &self.entries {
            writeln!(writer, "{}", entry.to_line()).map_err(SurveyError::LogWrite)?;
        }
        writer.flush().map_err(SurveyError::LogWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entries_keep_insertion_order_and_level() {
        let mut log = RunLog::new();
        log.info("first");
        log.warn("second");
        log.error("third");

        let levels: Vec<LogLevel> = log.entries().iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![LogLevel::Info, LogLevel::Warning, LogLevel::Error]
        );
        assert_eq!(log.entries()[1].message, "second");
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_to_line_uses_timestamp_level_message_layout() {
        let mut log = RunLog::new();
        log.warn("BPX: skipped");

        let line = log.entries()[0].to_line();
        let parts: Vec<&str> = line.splitn(3, " - ").collect();

        assert_eq!(parts.len(), 3, "line should have three parts: {}", line);
        assert_eq!(parts[0].len(), "2026-01-01 00:00:00,000".len());
        assert_eq!(parts[1], "WARNING");
        assert_eq!(parts[2], "BPX: skipped");
    }

    #[test]
    fn test_append_to_appends_across_runs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ExtractDicomInfo.log");

        let mut first = RunLog::new();
        first.info("run one");
        first.append_to(&path).expect("first append should succeed");

        let mut second = RunLog::new();
        second.info("run two");
        second.append_to(&path).expect("second append should succeed");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("run one"));
        assert!(lines[1].ends_with("run two"));
    }

    #[test]
    fn test_append_to_reports_unwritable_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("run.log");

        let err = RunLog::new()
            .append_to(&path)
            .expect_err("missing parent directory should fail");
        assert!(matches!(err, SurveyError::LogWrite(_)));
    }

    #[test]
    fn test_mentioning_filters_by_substring() {
        let mut log = RunLog::new();
        log.warn("BPX: skipped");
        log.info("BP001: done");

        assert_eq!(log.mentioning("BPX").count(), 1);
        assert_eq!(log.mentioning("BP").count(), 2);
    }
}
