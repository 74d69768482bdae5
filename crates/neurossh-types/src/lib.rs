//! Core types and structures for neurossh
//!
//! This crate provides the foundational types shared by the terminal bridge,
//! the stores and the application.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod keys;

pub use keys::{Key, KeyEvent, Modifiers};

// ============================================================================
// Constants
// ============================================================================

/// Default SSH port for saved targets
pub const DEFAULT_PORT: u16 = 22;

/// Folder label used when a target has none
pub const DEFAULT_FOLDER: &str = "Root";

/// Identity profile used when a target has none
pub const DEFAULT_PROFILE: &str = "DEV";

/// Fallback identity for profiles that cannot be resolved
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_SECRET: &str = "admin";

// ============================================================================
// Session Types
// ============================================================================

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_folder() -> String {
    DEFAULT_FOLDER.to_string()
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

/// A saved remote target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "generate_session_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_profile")]
    pub profile: String,
}

impl SessionConfig {
    /// Create a record with a fresh id and default port, folder and profile
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: generate_session_id(),
            name: name.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            folder: default_folder(),
            profile: default_profile(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Label shown on tabs and in the sidebar; falls back to the host
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.host
        } else {
            &self.name
        }
    }

    /// `host:port` address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Short random session id: the first 8 hex characters of a v4 UUID
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

// ============================================================================
// Credentials
// ============================================================================

/// Username and secret resolved from an identity profile
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_SECRET)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Anything that can turn a profile name into a credential.
///
/// Implementations must never fail: an unknown profile resolves to
/// [`Credential::default`] so a connection can still be attempted.
pub trait CredentialSource: Send + Sync {
    fn resolve(&self, profile: &str) -> Credential;
}

/// Credential source that always answers with the same identity
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(pub Credential);

impl CredentialSource for StaticCredentials {
    fn resolve(&self, _profile: &str) -> Credential {
        self.0.clone()
    }
}

// ============================================================================
// Bridge State
// ============================================================================

/// Lifecycle of one remote shell connection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BridgeState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
    Closed,
}

impl BridgeState {
    /// Failed and Closed are never left once entered
    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeState::Failed(_) | BridgeState::Closed)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, BridgeState::Connected)
    }

    /// Whether moving from `self` to `next` is a legal step of the state machine
    pub fn can_transition_to(&self, next: &BridgeState) -> bool {
        use BridgeState::*;
        match (self, next) {
            (Disconnected, Connecting) | (Disconnected, Closed) => true,
            (Connecting, Connected) | (Connecting, Failed(_)) | (Connecting, Closed) => true,
            (Connected, Closed) | (Connected, Failed(_)) => true,
            _ => false,
        }
    }

    /// Short label for status lines
    pub fn label(&self) -> &'static str {
        match self {
            BridgeState::Disconnected => "idle",
            BridgeState::Connecting => "connecting",
            BridgeState::Connected => "online",
            BridgeState::Failed(_) => "failed",
            BridgeState::Closed => "closed",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeState::Failed(reason) => write!(f, "failed: {}", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults_from_yaml() {
        let config: SessionConfig = serde_yaml::from_str("id: abc\nhost: 10.0.0.1\n").unwrap();
        assert_eq!(config.port, 22);
        assert_eq!(config.folder, "Root");
        assert_eq!(config.profile, "DEV");
        assert_eq!(config.display_name(), "10.0.0.1");
        assert_eq!(config.address(), "10.0.0.1:22");
    }

    #[test]
    fn test_generated_ids_are_short_and_distinct() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let cred = Credential::new("root", "hunter2");
        let rendered = format!("{:?}", cred);
        assert!(rendered.contains("root"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_state_machine_is_monotonic() {
        use BridgeState::*;
        assert!(Disconnected.can_transition_to(&Connecting));
        assert!(Connecting.can_transition_to(&Connected));
        assert!(Connected.can_transition_to(&Failed("reset".into())));
        assert!(!Connecting.can_transition_to(&Disconnected));
        assert!(!Connected.can_transition_to(&Connecting));
        assert!(!Closed.can_transition_to(&Connected));
        assert!(!Failed("x".into()).can_transition_to(&Closed));
        assert!(Closed.is_terminal());
    }
}
