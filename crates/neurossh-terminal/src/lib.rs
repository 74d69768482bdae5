// Remote session bridge module
//
// This module provides SSH shell bridges with full VT100/ANSI escape sequence
// interpretation, and the tab manager that multiplexes them behind a single
// focused display.

mod error;
mod keys;
mod screen_buffer;
mod logger;
pub mod transport;
mod ssh_transport;
mod bridge;
mod manager;
mod sequencer;

// Re-export public API
pub use error::BridgeError;
pub use keys::{reserved_command, translate, FocusCommand};
pub use screen_buffer::{CellStyle, Color, ScreenBuffer, ScreenSnapshot, StyledRow, StyledSpan};
pub use logger::SessionLogger;
pub use transport::{ConnectTarget, Connector, Geometry, ShellChannel};
pub use ssh_transport::SshConnector;
pub use bridge::{Bridge, BridgeContext, BridgeHandle, BridgeNotice, BridgeOptions, PollOutcome};
pub use manager::{RouteOutcome, TabManager, TabSummary, TabView};
pub use sequencer::{parse_script, run_sequence, Directive, SequenceReport};

/// Tab identifier, allocated monotonically by the manager
pub type TabId = u64;

// Constants
pub const DEFAULT_ROWS: u16 = 40;
pub const DEFAULT_COLS: u16 = 120;
pub const DEFAULT_TERM: &str = "xterm";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_COMMAND_DELAY_MS: u64 = 500;
pub const READ_CHUNK_BYTES: usize = 4096;
pub const MAX_CHUNKS_PER_POLL: usize = 16;
