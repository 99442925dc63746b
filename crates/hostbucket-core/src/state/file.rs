// # Applied-state file
//
// One JSON document holding the applied state of every property.
// Writes go to `<file>.tmp` and are renamed into place; the previous
// document is kept as `<file>.backup` and read when the main one is
// unreadable.
//
// ## Layout
//
// ```json
// {
//   "version": "1.0",
//   "properties": {
//     "prp_1": {
//       "network": "STAGING",
//       "hostnames": {
//         "www.example.com": {
//           "cert_provisioning_type": "CPS_MANAGED",
//           "edge_hostname_id": "ehn_1",
//           "cname_to": "www.example.com.edgekey.net"
//         }
//       },
//       "activation_ids": ["atv_1"],
//       "hostname_count": 1,
//       "last_updated": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{AppliedState, StateStore};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

/// Applied state persisted in a single JSON file
///
/// Every mutation is written through immediately.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    properties: HashMap<String, AppliedState>,
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    properties: HashMap<String, AppliedState>,
}

/// Why loading a state file failed
enum LoadError {
    /// The file exists but does not parse
    Corrupt(Error),
    /// Any other failure
    Other(Error),
}

impl FileStateStore {
    /// Open the store at `path`, creating parent directories
    ///
    /// An unparsable file falls back to its backup, then to an empty store.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "cannot create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let properties = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                properties,
                dirty: false,
            })),
        })
    }

    async fn load_state_with_recovery(
        path: &Path,
    ) -> Result<HashMap<String, AppliedState>, Error> {
        match Self::load_state(path).await {
            Ok(properties) => {
                tracing::debug!("applied state loaded for {} properties", properties.len());
                Ok(properties)
            }
            Err(LoadError::Other(e)) => Err(e),
            Err(LoadError::Corrupt(e)) => {
                tracing::warn!(
                    "state file unreadable ({}), trying backup",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("no state backup present, starting empty");
                    return Ok(HashMap::new());
                }

                match Self::load_state(&backup_path).await {
                    Ok(properties) => {
                        tracing::info!(
                            "restored {} properties from state backup",
                            properties.len()
                        );
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "could not rewrite state file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(properties)
                    }
                    Err(LoadError::Corrupt(backup_err) | LoadError::Other(backup_err)) => {
                        tracing::error!(
                            "state backup unreadable ({}), starting empty",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
        }
    }

    async fn load_state(path: &Path) -> Result<HashMap<String, AppliedState>, LoadError> {
        if !path.exists() {
            tracing::debug!("no state file at {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Other(Error::state_store(format!(
                "cannot read state file {}: {}",
                path.display(),
                e
            )))
        })?;

        let state_file: StateFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadError::Corrupt(Error::state_store(format!(
                "invalid state document {}: {}",
                path.display(),
                e
            )))
        })?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "state file version {} differs from {}, reading it anyway",
                state_file.version,
                STATE_FILE_VERSION
            );
        }

        Ok(state_file.properties)
    }

    /// Persist every property through the temp file and rename
    async fn write_state(&self) -> Result<(), Error> {
        let json = {
            let guard = self.state.read().await;
            let state_file = StateFileFormat {
                version: STATE_FILE_VERSION.to_string(),
                properties: guard.properties.clone(),
            };
            serde_json::to_string_pretty(&state_file)
                .map_err(|e| Error::state_store(format!("cannot encode applied state: {}", e)))?
        };

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "cannot create {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "cannot write {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "cannot sync {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("state backup not refreshed: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "cannot move {} over {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        self.state.write().await.dirty = false;

        tracing::trace!("applied state saved to {}", self.path.display());
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

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_state(&self, property_id: &str) -> Result<Option<AppliedState>, Error> {
        Ok(self.state.read().await.properties.get(property_id).cloned())
    }

    async fn set_state(&self, property_id: &str, state: &AppliedState) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard
                .properties
                .insert(property_id.to_string(), state.clone());
            guard.dirty = true;
        }
        self.write_state().await
    }

    async fn delete_state(&self, property_id: &str) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.properties.remove(property_id);
            guard.dirty = true;
        }
        self.write_state().await
    }

    async fn list_properties(&self) -> Result<Vec<String>, Error> {
        let mut ids: Vec<String> = self.state.read().await.properties.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty {
            self.write_state().await
        } else {
            Ok(())
        }
    }
}
