use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use neurossh_types::SessionConfig;

use crate::{read_yaml, write_yaml, Result, StoreError};

/// Saved sessions, kept as a YAML sequence in a single file.
///
/// Every mutation reads the current file and rewrites it in full.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    path: PathBuf,
}

impl SessionRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records; a missing or unreadable file yields an empty list
    pub fn load(&self) -> Vec<SessionConfig> {
        self.try_load().unwrap_or_default()
    }

    pub fn try_load(&self) -> Result<Vec<SessionConfig>> {
        Ok(read_yaml(&self.path)?.unwrap_or_default())
    }

    pub fn get(&self, id: &str) -> Option<SessionConfig> {
        self.load().into_iter().find(|session| session.id == id)
    }

    /// Look a session up by id first, then by name
    pub fn find(&self, key: &str) -> Option<SessionConfig> {
        let sessions = self.load();
        sessions
            .iter()
            .find(|session| session.id == key)
            .or_else(|| sessions.iter().find(|session| session.name == key))
            .cloned()
    }

    /// Replace the record with the same id, or append a new one
    pub fn upsert(&self, config: SessionConfig) -> Result<()> {
        let mut sessions = self.try_load()?;
        match sessions.iter_mut().find(|session| session.id == config.id) {
            Some(existing) => *existing = config,
            None => sessions.push(config),
        }
        write_yaml(&self.path, &sessions)
    }

    pub fn remove(&self, id: &str) -> Result<SessionConfig> {
        let mut sessions = self.try_load()?;
        let index = sessions
            .iter()
            .position(|session| session.id == id)
            .ok_or_else(|| StoreError::UnknownSession(id.to_string()))?;
        let removed = sessions.remove(index);
        write_yaml(&self.path, &sessions)?;
        Ok(removed)
    }

    /// Delete every record filed under `folder`; returns how many went
    pub fn remove_folder(&self, folder: &str) -> Result<usize> {
        let mut sessions = self.try_load()?;
        let before = sessions.len();
        sessions.retain(|session| session.folder != folder);
        let removed = before - sessions.len();
        if removed > 0 {
            write_yaml(&self.path, &sessions)?;
        }
        Ok(removed)
    }

    /// Distinct folder labels, sorted
    pub fn folders(&self) -> Vec<String> {
        self.grouped().into_iter().map(|(folder, _)| folder).collect()
    }

    /// Records grouped by folder for the sidebar tree; file order within a folder
    pub fn grouped(&self) -> Vec<(String, Vec<SessionConfig>)> {
        let mut groups: BTreeMap<String, Vec<SessionConfig>> = BTreeMap::new();
        for session in self.load() {
            groups.entry(session.folder.clone()).or_default().push(session);
        }
        groups.into_iter().collect()
    }
}
