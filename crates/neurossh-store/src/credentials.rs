use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use neurossh_types::{Credential, CredentialSource};
use serde::{Deserialize, Serialize};

use crate::{read_yaml, write_yaml, Result, StoreError, Vault};

/// Profiles offered when no identity has been saved yet
const FALLBACK_PROFILES: [&str; 2] = ["DEV", "PROD"];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityRecord {
    user: String,
    /// Vault token, never the plain secret
    #[serde(alias = "pass")]
    secret: String,
}

/// Identity profiles in a YAML map of `profile -> {user, secret}`
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    vault: Vault,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, vault: Vault) -> Self {
        Self {
            path: path.into(),
            vault,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn records(&self) -> Result<BTreeMap<String, IdentityRecord>> {
        Ok(read_yaml(&self.path)?.unwrap_or_default())
    }

    /// Store or replace a profile, sealing its secret
    pub fn save_profile(&self, name: &str, user: &str, secret: &str) -> Result<()> {
        let mut records = self.records()?;
        records.insert(
            name.to_string(),
            IdentityRecord {
                user: user.to_string(),
                secret: self.vault.seal(secret)?,
            },
        );
        write_yaml(&self.path, &records)
    }

    pub fn remove_profile(&self, name: &str) -> Result<()> {
        let mut records = self.records()?;
        if records.remove(name).is_none() {
            return Err(StoreError::UnknownProfile(name.to_string()));
        }
        write_yaml(&self.path, &records)
    }

    /// Saved profile names, sorted; DEV and PROD when nothing is saved
    pub fn profiles(&self) -> Vec<String> {
        let names: Vec<String> = self
            .records()
            .map(|records| records.into_keys().collect())
            .unwrap_or_default();
        if names.is_empty() {
            FALLBACK_PROFILES.iter().map(|name| name.to_string()).collect()
        } else {
            names
        }
    }

    pub fn try_resolve(&self, profile: &str) -> Result<Option<Credential>> {
        let Some(record) = self.records()?.remove(profile) else {
            return Ok(None);
        };
        let secret = self.vault.reveal(&record.secret)?;
        Ok(Some(Credential::new(record.user, secret)))
    }
}

impl CredentialSource for CredentialStore {
    fn resolve(&self, profile: &str) -> Credential {
        self.try_resolve(profile).ok().flatten().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store(dir: &Path) -> CredentialStore {
        CredentialStore::new(dir.join("identities.yaml"), Vault::from_key(&[9u8; 32]).unwrap())
    }

    #[test]
    fn test_secret_is_sealed_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        store.save_profile("PROD", "deploy", "s3cr3t").unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("deploy"));
        assert!(!raw.contains("s3cr3t"));
        assert_eq!(store.resolve("PROD"), Credential::new("deploy", "s3cr3t"));
    }

    #[test]
    fn test_plain_legacy_secret_falls_back_to_default() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        std::fs::write(store.path(), "DEV:\n  user: root\n  pass: toor\n").unwrap();

        assert!(store.try_resolve("DEV").is_err());
        assert_eq!(store.resolve("DEV"), Credential::default());
        assert_eq!(store.profiles(), vec!["DEV".to_string()]);
    }
}
