// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: new content goes to a `.tmp` file which is then renamed
// - Backup: the previous file is copied to `.backup` before each write
// - Recovery: a file that fails to parse is replaced by its backup
//
// ## File Format
//
// ```json
// {
//   "version": "1",
//   "sets": {
//     "_sip._tcp.example.org.": {
//       "id": "_sip._tcp.example.org.",
//       "name": { "service": "sip", "proto": "tcp", "zone": "example.org." },
//       "ttl": 300,
//       "records": [
//         { "priority": 10, "weight": 5, "port": 5060, "target": "a.example.org.", "ttl": 300 }
//       ],
//       "last_reconciled": "2026-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{SetState, StateStore, StateStoreFactory};

const STATE_FILE_VERSION: &str = "1";

/// File-based state store with crash recovery
///
/// Every mutation is written through to disk immediately.
///
/// # Example
///
/// ```rust,no_run
/// use srvset_core::state::FileStateStore;
/// use srvset_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/srvset/state.json").await?;
///     for id in store.list_sets().await? {
///         println!("{id}");
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    sets: BTreeMap<String, SetState>,
    dirty: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFileFormat {
    version: String,
    sets: BTreeMap<String, SetState>,
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// Parent directories are created as needed. A corrupted file falls back
    /// to its backup, and to an empty store when the backup is unusable too.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let sets = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState { sets, dirty: false })),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<String, SetState>, Error> {
        let content = match Self::read_file(path).await? {
            Some(content) => content,
            None => {
                tracing::debug!("State file does not exist: {}", path.display());
                return Ok(BTreeMap::new());
            }
        };

        match Self::parse(&content) {
            Ok(sets) => {
                tracing::debug!("Loaded state from file: {} set(s)", sets.len());
                Ok(sets)
            }
            Err(e) => {
                tracing::warn!("State file {} is corrupted: {}. Trying backup.", path.display(), e);

                let backup_path = Self::backup_path(path);
                let backup = match Self::read_file(&backup_path).await? {
                    Some(backup) => backup,
                    None => {
                        tracing::warn!("No backup file found. Starting with empty state.");
                        return Ok(BTreeMap::new());
                    }
                };

                match Self::parse(&backup) {
                    Ok(sets) => {
                        tracing::info!("Recovered state from backup: {} set(s)", sets.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!("Failed to restore state file from backup: {}", restore_err);
                        }
                        Ok(sets)
                    }
                    Err(backup_err) => {
                        tracing::error!("Backup also corrupted: {}. Starting with empty state.", backup_err);
                        Ok(BTreeMap::new())
                    }
                }
            }
        }
    }

    async fn read_file(path: &Path) -> Result<Option<String>, Error> {
        if !path.exists() {
            return Ok(None);
        }

        fs::read_to_string(path).await.map(Some).map_err(|e| {
            Error::state_store(format!("Failed to read state file {}: {}", path.display(), e))
        })
    }

    fn parse(content: &str) -> Result<BTreeMap<String, SetState>, Error> {
        let file: StateFileFormat = serde_json::from_str(content)?;

        if file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. Loading anyway.",
                STATE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.sets)
    }

    /// Write state to file atomically
    async fn write_state(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;

        let file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            sets: guard.sets.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        guard.dirty = false;
        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Force immediate write to disk
    pub async fn sync(&self) -> Result<(), Error> {
        self.write_state().await
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_set(&self, id: &str) -> Result<Option<SetState>, Error> {
        Ok(self.state.read().await.sets.get(id).cloned())
    }

    async fn put_set(&self, state: &SetState) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.sets.insert(state.id.clone(), state.clone());
            guard.dirty = true;
        }
        self.write_state().await
    }

    async fn delete_set(&self, id: &str) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            if guard.sets.remove(id).is_none() {
                return Ok(());
            }
            guard.dirty = true;
        }
        self.write_state().await
    }

    async fn list_sets(&self) -> Result<Vec<String>, Error> {
        Ok(self.state.read().await.sets.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write_state().await } else { Ok(()) }
    }
}

/// Factory for `{"type": "file", "path": ...}` state store configurations
#[derive(Debug, Default)]
pub struct FileStateStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStateStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn StateStore>, Error> {
        let path = config
            .get("path")
            .and_then(|p| p.as_str())
            .ok_or_else(|| Error::config("File state store requires a 'path'"))?;

        Ok(Box::new(FileStateStore::new(path).await?))
    }
}
