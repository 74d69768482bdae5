/// Transport abstraction between a bridge and the remote shell
use async_trait::async_trait;
use neurossh_types::{Credential, SessionConfig};
use std::io;

use crate::error::BridgeError;
use crate::{DEFAULT_COLS, DEFAULT_ROWS, DEFAULT_TERM};

/// Fixed virtual terminal size negotiated with the remote shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub rows: u16,
    pub cols: u16,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

/// Where to connect and which terminal type to announce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub term: String,
}

impl ConnectTarget {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&SessionConfig> for ConnectTarget {
    fn from(config: &SessionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            term: DEFAULT_TERM.to_string(),
        }
    }
}

/// An established interactive shell.
///
/// All methods must return promptly: the bridge calls them from its poll tick
/// while holding the channel lock.
pub trait ShellChannel: Send {
    /// Non-blocking read.
    ///
    /// `Ok(0)` means the remote side closed the channel; an error of kind
    /// `WouldBlock` means no data is ready yet; any other error means the
    /// connection is lost.
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Queue bytes for the remote shell
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Release the connection. Called at most once by the bridge.
    fn close(&mut self);
}

/// Establishes shells; one implementation per wire protocol
#[async_trait]
pub trait Connector: Send + Sync {
    /// Authenticate and negotiate a shell with a PTY of the given size
    async fn connect(
        &self,
        target: &ConnectTarget,
        credential: &Credential,
        geometry: Geometry,
    ) -> Result<Box<dyn ShellChannel>, BridgeError>;

    /// Get connector name for debugging
    fn connector_name(&self) -> &str;
}
