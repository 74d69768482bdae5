use std::time::Duration;

use neurossh_types::BridgeState;
use thiserror::Error;

use crate::TabId;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("connection to {address} failed: {message}")]
    Connect { address: String, message: String },
    #[error("authentication rejected for user '{0}'")]
    AuthRejected(String),
    #[error("connection attempt timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("shell negotiation failed: {0}")]
    Shell(String),
    #[error("bridge is not connected ({0})")]
    NotConnected(BridgeState),
    #[error("write to remote shell failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("tab {0} not found")]
    UnknownTab(TabId),
    #[error("invalid script line {line}: {message}")]
    Script { line: usize, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
