// neurossh library - shared by the binary and its tests
pub mod cli;
pub mod commands;
pub mod config;
pub mod tui;

pub use cli::{Cli, Commands};
pub use config::{AppConfig, Paths};
