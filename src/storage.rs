use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::host::HostContext;

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_warn};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("host context invalidated")]
    ContextInvalidated,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keys whose values actually changed in one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub keys: Vec<String>,
}

/// Flat JSON key-value store shared by the settings surface and the poller.
///
/// The file is shared with other flowcue processes (the `settings` and
/// `tasks` commands), so every write first merges what is on disk, then
/// persists and announces both the merged and the written keys.
pub struct KeyValueStore {
    path: PathBuf,
    data: RwLock<Map<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
    host: HostContext,
}

impl KeyValueStore {
    pub fn open(path: PathBuf, host: HostContext) -> Result<Self, StoreError> {
        let data = load_disk(&path)?.unwrap_or_default();
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            data: RwLock::new(data),
            changes,
            host,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_all(&self) -> Map<String, Value> {
        self.read().clone()
    }

    /// Subset of `keys` that are present.
    pub fn get(&self, keys: &[&str]) -> Map<String, Value> {
        let guard = self.read();
        keys.iter()
            .filter_map(|key| guard.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect()
    }

    pub fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        self.update(entries, &[])
    }

    pub fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.update(Map::new(), keys)
    }

    /// Insert `entries` and drop `removals` in one persisted write.
    pub fn update(&self, entries: Map<String, Value>, removals: &[&str]) -> Result<(), StoreError> {
        self.ensure_host()?;
        let changed = {
            let mut guard = self.write();
            let mut changed = self.merge_disk(&mut guard)?;

            let mut written = Vec::new();
            for (key, value) in entries {
                if guard.get(&key) != Some(&value) {
                    guard.insert(key.clone(), value);
                    written.push(key);
                }
            }
            for key in removals {
                if guard.remove(*key).is_some() {
                    written.push(key.to_string());
                }
            }

            if !written.is_empty() {
                self.persist(&guard)?;
            }
            for key in written {
                if !changed.contains(&key) {
                    changed.push(key);
                }
            }
            changed
        };
        self.announce(changed);
        Ok(())
    }

    /// Pick up edits another process made to the file.
    ///
    /// Returns the keys that differed; they are announced like local writes.
    pub fn reload(&self) -> Result<Vec<String>, StoreError> {
        let changed = {
            let mut guard = self.write();
            self.merge_disk(&mut guard)?
        };
        if !changed.is_empty() {
            log_debug!("store reloaded; {} keys changed on disk", changed.len());
        }
        self.announce(changed.clone());
        Ok(changed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn ensure_host(&self) -> Result<(), StoreError> {
        if self.host.is_valid() {
            Ok(())
        } else {
            Err(StoreError::ContextInvalidated)
        }
    }

    fn announce(&self, keys: Vec<String>) {
        if !keys.is_empty() {
            // No subscribers is fine.
            let _ = self.changes.send(StoreChange { keys });
        }
    }

    /// Replace `data` with the file contents; returns the keys that differ.
    ///
    /// A missing or unparsable file leaves memory as it is.
    fn merge_disk(&self, data: &mut Map<String, Value>) -> Result<Vec<String>, StoreError> {
        let Some(disk) = load_disk(&self.path)? else {
            return Ok(Vec::new());
        };

        let mut changed: Vec<String> = disk
            .iter()
            .filter(|(key, value)| data.get(*key) != Some(*value))
            .map(|(key, _)| key.clone())
            .collect();
        changed.extend(data.keys().filter(|key| !disk.contains_key(*key)).cloned());

        *data = disk;
        Ok(changed)
    }

    /// Write through a sibling file and rename, so readers never see half a file.
    fn persist(&self, data: &Map<String, Value>) -> Result<(), StoreError> {
        let serialized = serde_json::to_string_pretty(data)?;
        let staging = self.staging_path();
        fs::write(&staging, serialized)?;
        if let Err(err) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }

    fn read(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Map<String, Value>> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn load_disk(path: &Path) -> Result<Option<Map<String, Value>>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    match serde_json::from_str::<Map<String, Value>>(&contents) {
        Ok(map) => Ok(Some(map)),
        Err(err) => {
            log_warn!("store at {} unreadable ({err}); ignoring file", path.display());
            Ok(None)
        }
    }
}
