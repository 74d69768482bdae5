use chrono::{DateTime, Utc};
use serde::Serialize;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::ensure_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Serialize)]
struct LogEntry<'a> {
    timestamp: String, // ISO‑8601 UTC
    level: Level,
    component: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    fields: serde_json::Value,
}

/// Process-wide JSONL event log.
///
/// One file per run; shared by `Arc` between the display loop and the bridge
/// tasks. A disabled logger accepts every call and writes nothing.
pub struct AppLogger {
    file_path: Option<PathBuf>,
    file: Mutex<Option<File>>,
    min_level: Level,
}

impl std::fmt::Debug for AppLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppLogger")
            .field("file_path", &self.file_path)
            .field("min_level", &self.min_level)
            .finish()
    }
}

impl AppLogger {
    /// Create a new logger in `logs_dir`; the file name is based on the current UTC time.
    pub fn new(logs_dir: &Path) -> Result<Self> {
        ensure_dir(logs_dir)?;

        let now: DateTime<Utc> = Utc::now();
        let filename = format!("neurossh-{}.jsonl", now.format("%Y-%m-%d-%H%M%S"));
        let file_path = logs_dir.join(filename);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .context("Failed to create application log file")?;

        Ok(Self {
            file_path: Some(file_path),
            file: Mutex::new(Some(file)),
            min_level: Level::Info,
        })
    }

    /// A logger that drops everything
    pub fn disabled() -> Self {
        Self {
            file_path: None,
            file: Mutex::new(None),
            min_level: Level::Error,
        }
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Append a single log entry. Write failures are swallowed: logging must
    /// never take the display loop or a bridge task down.
    pub fn log(&self, level: Level, component: &str, message: &str, fields: serde_json::Value) {
        if level < self.min_level {
            return;
        }
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(file) = guard.as_mut() else {
            return;
        };

        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level,
            component,
            message,
            fields,
        };
        if let Ok(json) = serde_json::to_string(&entry) {
            if writeln!(file, "{}", json).is_err() {
                // Stop writing to a broken file rather than retrying every call
                *guard = None;
            }
        }
    }

    pub fn debug(&self, component: &str, message: &str, fields: serde_json::Value) {
        self.log(Level::Debug, component, message, fields);
    }

    pub fn info(&self, component: &str, message: &str, fields: serde_json::Value) {
        self.log(Level::Info, component, message, fields);
    }

    pub fn warn(&self, component: &str, message: &str, fields: serde_json::Value) {
        self.log(Level::Warn, component, message, fields);
    }

    pub fn error(&self, component: &str, message: &str, fields: serde_json::Value) {
        self.log(Level::Error, component, message, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entries_are_json_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = AppLogger::new(tmp.path()).unwrap();
        logger.info("manager", "tab opened", json!({"tab": 1}));
        logger.debug("manager", "filtered out", serde_json::Value::Null);
        logger.warn("bridge", "no fields", serde_json::Value::Null);

        let contents = std::fs::read_to_string(logger.file_path().unwrap()).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "info");
        assert_eq!(lines[0]["fields"]["tab"], 1);
        assert_eq!(lines[1]["component"], "bridge");
        assert!(lines[1].get("fields").is_none());
    }

    #[test]
    fn test_disabled_logger_is_silent() {
        let logger = AppLogger::disabled();
        logger.error("bridge", "nothing happens", json!({}));
        assert!(logger.file_path().is_none());
    }
}
