//! Persistent state: saved sessions, identity profiles and the secret vault.

mod credentials;
mod registry;
mod vault;

use std::path::PathBuf;

use thiserror::Error;

pub use credentials::CredentialStore;
pub use registry::SessionRegistry;
pub use vault::Vault;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault key must be {expected} bytes, got {actual}")]
    InvalidKey { expected: usize, actual: usize },
    #[error("sealed data is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("sealed data is too short")]
    Truncated,
    #[error("secret could not be sealed")]
    Seal,
    #[error("sealed data could not be decrypted")]
    Decrypt,
    #[error("revealed secret is not valid UTF-8")]
    Utf8,
    #[error("vault key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("no session with id '{0}'")]
    UnknownSession(String),
    #[error("no identity profile named '{0}'")]
    UnknownProfile(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read a YAML document; a missing file reads as `None`
pub(crate) fn read_yaml<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<Option<T>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_yaml::from_str(&text)
        .map(Some)
        .map_err(|source| StoreError::Yaml {
            path: path.to_path_buf(),
            source,
        })
}

/// Rewrite a YAML document in full, creating parent directories as needed
pub(crate) fn write_yaml<T: serde::Serialize>(path: &std::path::Path, value: &T) -> Result<()> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let text = serde_yaml::to_string(value).map_err(|source| StoreError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(io_err)
}
