use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use chrono::Utc;
use neurossh_types::BridgeState;
use serde_json::json;

use crate::TabId;

/// Per-bridge JSONL log of wire traffic and state changes
pub struct SessionLogger {
    tab: TabId,
    path: PathBuf,
    log_file: File,
    bytes_in: u64,
    bytes_out: u64,
}

impl SessionLogger {
    /// Create a new session logger in `log_dir`
    pub fn new(tab: TabId, label: &str, log_dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;

        let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
        let path = log_dir.join(format!("tab-{}-{}-{}.jsonl", tab, sanitize(label), timestamp));
        let log_file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            tab,
            path,
            log_file,
            bytes_in: 0,
            bytes_out: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log bytes sent to the remote shell
    pub fn log_input(&mut self, data: &[u8]) -> io::Result<()> {
        self.bytes_out += data.len() as u64;
        self.log_data("in", data)
    }

    /// Log bytes received from the remote shell
    pub fn log_output(&mut self, data: &[u8]) -> io::Result<()> {
        self.bytes_in += data.len() as u64;
        self.log_data("out", data)
    }

    /// Log a state transition
    pub fn log_state(&mut self, state: &BridgeState) -> io::Result<()> {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "tab": self.tab,
            "event": "state",
            "state": state.to_string(),
            "bytes_in": self.bytes_in,
            "bytes_out": self.bytes_out,
        });
        self.write_entry(&entry)
    }

    fn log_data(&mut self, direction: &str, data: &[u8]) -> io::Result<()> {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "tab": self.tab,
            "direction": direction,
            "data": String::from_utf8_lossy(data),
        });
        self.write_entry(&entry)
    }

    fn write_entry(&mut self, entry: &serde_json::Value) -> io::Result<()> {
        writeln!(self.log_file, "{}", entry)?;
        self.log_file.flush()
    }
}

/// Keep file names portable
pub(crate) fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "session".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_record_direction_and_state() {
        let tmp = tempfile::tempdir().unwrap();
        let mut logger = SessionLogger::new(7, "web 01", tmp.path()).unwrap();
        logger.log_input(b"ls\n").unwrap();
        logger.log_output(b"file.txt\r\n").unwrap();
        logger.log_state(&BridgeState::Closed).unwrap();

        let name = logger.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("tab-7-web_01-"));

        let contents = std::fs::read_to_string(logger.path()).unwrap();
        let entries: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(entries[0]["direction"], "in");
        assert_eq!(entries[0]["data"], "ls\n");
        assert_eq!(entries[1]["direction"], "out");
        assert_eq!(entries[2]["state"], "closed");
        assert_eq!(entries[2]["bytes_in"], 10);
        assert_eq!(entries[2]["bytes_out"], 3);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("db/prod:22"), "db_prod_22");
        assert_eq!(sanitize(""), "session");
    }
}
