//! Newline-delimited JSON error log.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use dynabot_core::error::Result;
use dynabot_core::types::{ErrorRecord, ErrorStage};

/// Number of lines the presentation views show by default.
pub const DEFAULT_TAIL_LINES: usize = 10;

/// Append-only error log, one [`ErrorRecord`] per line.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record for `context` with the given details.
    pub fn log(&self, context: ErrorStage, details: impl Into<String>) -> Result<ErrorRecord> {
        let record = ErrorRecord::new(context, details);
        self.append(&record)?;
        Ok(record)
    }

    /// Append one record as a single JSON line.
    pub fn append(&self, record: &ErrorRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// The last `n` non-empty raw lines, oldest first.
    ///
    /// A missing log yields no lines.
    pub fn tail(&self, n: usize) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let start = lines.len().saturating_sub(n);
        Ok(lines[start..].iter().map(|l| l.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> (tempfile::TempDir, ErrorLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("system_errors.json"));
        (dir, log)
    }

    #[test]
    fn test_tail_of_missing_log_is_empty() {
        let (_dir, log) = temp_log();
        assert!(log.tail(DEFAULT_TAIL_LINES).unwrap().is_empty());
    }

    #[test]
    fn test_one_object_per_line() {
        let (_dir, log) = temp_log();
        log.log(ErrorStage::Initialization, "missing api key").unwrap();
        log.log(ErrorStage::Generation, "quota exceeded").unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: ErrorRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.context, ErrorStage::Initialization);
        assert_eq!(first.details, "missing api key");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["context"], "GENERATION");
        assert_eq!(second["details"], "quota exceeded");
    }

    #[test]
    fn test_details_with_newlines_stay_on_one_line() {
        let (_dir, log) = temp_log();
        log.log(ErrorStage::Generation, "line one\nline two").unwrap();
        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 1);
    }

    #[test]
    fn test_tail_returns_last_n_in_order() {
        let (_dir, log) = temp_log();
        for i in 0..15 {
            log.log(ErrorStage::Generation, format!("failure {}", i))
                .unwrap();
        }

        let tail = log.tail(DEFAULT_TAIL_LINES).unwrap();
        assert_eq!(tail.len(), 10);
        assert!(tail[0].contains("failure 5"));
        assert!(tail[9].contains("failure 14"));
    }

    #[test]
    fn test_tail_larger_than_log() {
        let (_dir, log) = temp_log();
        log.log(ErrorStage::VoiceCapture, "timeout").unwrap();
        let tail = log.tail(50).unwrap();
        assert_eq!(tail.len(), 1);
    }

    #[test]
    fn test_append_preserves_existing_lines() {
        let (_dir, log) = temp_log();
        std::fs::write(log.path(), "{\"legacy\": true}\n").unwrap();
        log.log(ErrorStage::Generation, "new").unwrap();
        let tail = log.tail(10).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0], "{\"legacy\": true}");
    }
}
