use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::VaultError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Symmetric cipher for secrets at rest.
///
/// Sealed values are `base64(nonce || ciphertext)`, so each seal of the
/// same plaintext produces a different token.
#[derive(Clone)]
pub struct Vault {
    key: Key,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").field("key", &"<redacted>").finish()
    }
}

impl Vault {
    /// Fresh random key, lost when the vault is dropped
    pub fn generate() -> Self {
        Self {
            key: ChaCha20Poly1305::generate_key(&mut OsRng),
        }
    }

    pub fn from_key(bytes: &[u8]) -> Result<Self, VaultError> {
        if bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKey {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            key: *Key::from_slice(bytes),
        })
    }

    /// Load the key stored at `path`, or create one there (mode 0600 on unix)
    pub fn load_or_create(path: &Path) -> Result<Self, VaultError> {
        let key_file_err = |source| VaultError::KeyFile {
            path: path.to_path_buf(),
            source,
        };

        if path.exists() {
            let encoded = fs::read_to_string(path).map_err(key_file_err)?;
            let bytes = STANDARD.decode(encoded.trim())?;
            return Self::from_key(&bytes);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(key_file_err)?;
            }
        }

        let vault = Self::generate();
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(key_file_err)?;
        file.write_all(STANDARD.encode(vault.key.as_slice()).as_bytes())
            .map_err(key_file_err)?;
        Ok(vault)
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, VaultError> {
        let cipher = ChaCha20Poly1305::new(&self.key);
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a token produced by [`Vault::seal`] with the same key
    pub fn reveal(&self, token: &str) -> Result<String, VaultError> {
        let sealed = STANDARD.decode(token.trim())?;
        if sealed.len() < NONCE_LEN {
            return Err(VaultError::Truncated);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(&self.key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| VaultError::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seal_is_not_plaintext() {
        let vault = Vault::generate();
        let token = vault.seal("hunter2").unwrap();
        assert!(!token.contains("hunter2"));
        assert_ne!(token, vault.seal("hunter2").unwrap());
        assert_eq!(vault.reveal(&token).unwrap(), "hunter2");
    }

    #[test]
    fn test_reveal_rejects_foreign_or_tampered_data() {
        let vault = Vault::generate();
        let other = Vault::generate();
        let token = vault.seal("secret").unwrap();
        assert!(matches!(other.reveal(&token), Err(VaultError::Decrypt)));

        let mut raw = STANDARD.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(matches!(
            vault.reveal(&STANDARD.encode(raw)),
            Err(VaultError::Decrypt)
        ));
        assert!(matches!(vault.reveal("AAAA"), Err(VaultError::Truncated)));
        assert!(matches!(vault.reveal("not base64!"), Err(VaultError::Encoding(_))));
    }

    #[test]
    fn test_from_key_checks_length() {
        assert!(matches!(
            Vault::from_key(&[0u8; 16]),
            Err(VaultError::InvalidKey { actual: 16, .. })
        ));
        assert!(Vault::from_key(&[7u8; 32]).is_ok());
    }

    #[test]
    fn test_key_file_is_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("keys").join("vault.key");

        let first = Vault::load_or_create(&path).unwrap();
        let token = first.seal("persisted").unwrap();
        let second = Vault::load_or_create(&path).unwrap();
        assert_eq!(second.reveal(&token).unwrap(), "persisted");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    proptest! {
        #[test]
        fn prop_reveal_inverts_seal(secret in ".*") {
            let vault = Vault::from_key(&[42u8; 32]).unwrap();
            let token = vault.seal(&secret).unwrap();
            prop_assert_eq!(vault.reveal(&token).unwrap(), secret);
        }
    }
}
