use std::path::PathBuf;

use clap::{Parser, Subcommand};
use neurossh_types::{DEFAULT_FOLDER, DEFAULT_PORT, DEFAULT_PROFILE};

/// CLI arguments for neurossh
#[derive(Parser, Debug)]
#[command(name = "neurossh")]
#[command(about = "Multi-session SSH client with a tabbed terminal UI")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding sessions, identities, the vault key and logs
    #[arg(long, env = "NEUROSSH_DATA_DIR", value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/config.toml)
    #[arg(long, env = "NEUROSSH_CONFIG", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Seconds to wait for a connection before giving up
    #[arg(long, value_name = "SECS", global = true)]
    pub connect_timeout: Option<u64>,

    /// Remote terminal height
    #[arg(long, global = true)]
    pub rows: Option<u16>,

    /// Remote terminal width
    #[arg(long, global = true)]
    pub cols: Option<u16>,

    /// Record every bridge's traffic as JSONL under the logs directory
    #[arg(long, global = true)]
    pub log_io: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Open the interactive terminal UI (default)
    Tui,
    /// List saved sessions grouped by folder
    List,
    /// Save a new session
    Add {
        /// Label shown in the sidebar and on tabs
        name: String,
        /// Host name or address
        host: String,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        #[arg(short, long, default_value = DEFAULT_FOLDER)]
        folder: String,
        /// Identity profile used to log in
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,
    },
    /// Delete a session by id, or a whole folder
    Remove {
        /// Session id
        #[arg(required_unless_present = "folder")]
        id: Option<String>,
        /// Delete every session in this folder instead
        #[arg(long, conflicts_with = "id")]
        folder: Option<String>,
    },
    /// Save or replace an identity profile
    Identity {
        profile: String,
        user: String,
        #[arg(long, env = "NEUROSSH_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// List identity profiles
    Profiles,
    /// Connect to a session, play a script against it and print the final screen
    Run {
        /// Session id or name
        session: String,
        /// Script file: one line per command, `WAIT <seconds>` pauses
        script: PathBuf,
    },
}
