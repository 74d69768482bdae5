use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use neurossh_terminal::{
    BridgeOptions, Geometry, DEFAULT_COLS, DEFAULT_COMMAND_DELAY_MS, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_ROWS, DEFAULT_TERM,
};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Settings read from `config.toml`; every field is optional in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub connect_timeout_secs: u64,
    pub rows: u16,
    pub cols: u16,
    pub poll_interval_ms: u64,
    pub command_delay_ms: u64,
    pub log_io: bool,
    pub transcript_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            command_delay_ms: DEFAULT_COMMAND_DELAY_MS,
            log_io: false,
            transcript_dir: None,
        }
    }
}

impl AppConfig {
    /// Load the config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// CLI flags take precedence over file values
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<()> {
        if let Some(secs) = cli.connect_timeout {
            self.connect_timeout_secs = secs;
        }
        if let Some(rows) = cli.rows {
            self.rows = rows;
        }
        if let Some(cols) = cli.cols {
            self.cols = cols;
        }
        if cli.log_io {
            self.log_io = true;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            bail!("terminal size must be non-zero, got {}x{}", self.rows, self.cols);
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be at least 1");
        }
        if self.connect_timeout_secs == 0 {
            bail!("connect_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            connect_timeout: self.connect_timeout(),
            poll_interval: self.poll_interval(),
            geometry: Geometry {
                rows: self.rows,
                cols: self.cols,
            },
            term: DEFAULT_TERM.to_string(),
        }
    }
}

/// Locations of everything neurossh keeps on disk
#[derive(Debug, Clone, PartialEq)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub sessions_file: PathBuf,
    pub identities_file: PathBuf,
    pub vault_key: PathBuf,
    pub logs_dir: PathBuf,
}

impl Paths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config_file: data_dir.join("config.toml"),
            sessions_file: data_dir.join("sessions.yaml"),
            identities_file: data_dir.join("identities.yaml"),
            vault_key: data_dir.join("vault.key"),
            logs_dir: data_dir.join("logs"),
            data_dir,
        }
    }

    /// Resolve from `--data-dir` / `--config`, falling back to `~/.neurossh`
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => neurossh_logging::default_data_dir()?,
        };
        let mut paths = Self::new(data_dir);
        if let Some(config) = &cli.config {
            paths.config_file = config.clone();
        }
        Ok(paths)
    }

    /// Where saved screen transcripts go
    pub fn transcript_dir(&self, config: &AppConfig) -> PathBuf {
        config
            .transcript_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("transcripts"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bridge_options().geometry, Geometry { rows: 40, cols: 120 });
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "rows = 24\nlog_io = true\ntranscript_dir = \"/tmp/shots\"\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.rows, 24);
        assert_eq!(config.cols, 120);
        assert!(config.log_io);
        assert_eq!(config.transcript_dir, Some(PathBuf::from("/tmp/shots")));
    }

    #[test]
    fn test_rejects_zero_size() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "cols = 0\n").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let cli = Cli::try_parse_from([
            "neurossh",
            "--data-dir",
            "/srv/neuro",
            "--connect-timeout",
            "3",
            "--log-io",
        ])
        .unwrap();
        let mut config = AppConfig {
            connect_timeout_secs: 30,
            ..AppConfig::default()
        };
        config.apply_cli(&cli).unwrap();
        assert_eq!(config.connect_timeout_secs, 3);
        assert!(config.log_io);

        let paths = Paths::from_cli(&cli).unwrap();
        assert_eq!(paths.sessions_file, PathBuf::from("/srv/neuro/sessions.yaml"));
        assert_eq!(paths.config_file, PathBuf::from("/srv/neuro/config.toml"));
        assert_eq!(paths.transcript_dir(&config), PathBuf::from("/srv/neuro/transcripts"));
    }
}
