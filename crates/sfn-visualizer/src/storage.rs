//! Persistent storage scope for cached assets and their bookkeeping state.
//!
//! A scope is a directory holding the asset files plus `state.json`, a small
//! key/value map that survives restarts (the cache records which source
//! revision each asset was last written from).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{CacheError, CacheResult};

/// File name of the persisted key/value state.
pub const STATE_FILE: &str = "state.json";

/// Current state file version.
const STATE_VERSION: u32 = 1;

/// A durable location the cache may write assets into.
pub struct StorageScope {
    root: PathBuf,
    state: Mutex<BTreeMap<String, String>>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl StorageScope {
    /// Open the scope rooted at `root`. The directory does not have to exist yet.
    pub fn open(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        let state_path = root.join(STATE_FILE);

        let entries = if state_path.exists() {
            let raw = std::fs::read(&state_path)?;
            match serde_json::from_slice::<StateFile>(&raw) {
                Ok(file) if file.version == STATE_VERSION => file.entries,
                Ok(file) => {
                    tracing::warn!(
                        "Ignoring storage state {} with unsupported version {}",
                        state_path.display(),
                        file.version
                    );
                    BTreeMap::new()
                }
                Err(e) => {
                    tracing::warn!(
                        "Ignoring unreadable storage state {}: {e}",
                        state_path.display()
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(
            "Opened storage scope {} ({} state entries)",
            root.display(),
            entries.len()
        );

        Ok(Self {
            root,
            state: Mutex::new(entries),
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an asset named `name` lives at inside this scope.
    pub fn asset_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Read a persisted value.
    pub fn get(&self, key: &str) -> Option<String> {
        self.state.lock().get(key).cloned()
    }

    /// Set a persisted value and write the state file.
    pub async fn update(&self, key: &str, value: &str) -> CacheResult<()> {
        let _persist = self.persist_lock.lock().await;

        let snapshot = {
            let mut state = self.state.lock();
            state.insert(key.to_string(), value.to_string());
            state.clone()
        };

        self.write_state(snapshot).await
    }

    /// Whether the asset file exists.
    pub async fn asset_exists(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.asset_path(name))
            .await
            .unwrap_or(false)
    }

    /// Write an asset file, creating the scope directory if needed.
    pub async fn write_asset(&self, name: &str, bytes: &[u8]) -> CacheResult<PathBuf> {
        validate_asset_name(name)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.asset_path(name);
        let tmp = self.root.join(format!(".{name}.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    async fn write_state(&self, entries: BTreeMap<String, String>) -> CacheResult<()> {
        let payload = serde_json::to_vec_pretty(&StateFile {
            version: STATE_VERSION,
            entries,
        })
        .map_err(|e| CacheError::State(format!("Serialization failed: {e}")))?;

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(STATE_FILE);
        let tmp = self.root.join(format!(".{STATE_FILE}.tmp"));
        tokio::fs::write(&tmp, payload).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn validate_asset_name(name: &str) -> CacheResult<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && name != STATE_FILE;
    if plain {
        Ok(())
    } else {
        Err(CacheError::State(format!("Invalid asset name: {name:?}")))
    }
}

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let scope = StorageScope::open(dir.path()).unwrap();
        assert_eq!(scope.get("script"), None);

        scope.update("script", "rev-1").await.unwrap();
        scope.update("style", "rev-2").await.unwrap();
        drop(scope);

        let reopened = StorageScope::open(dir.path()).unwrap();
        assert_eq!(reopened.get("script").as_deref(), Some("rev-1"));
        assert_eq!(reopened.get("style").as_deref(), Some("rev-2"));
    }

    #[tokio::test]
    async fn test_missing_root_is_created_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("scope");
        let scope = StorageScope::open(&root).unwrap();

        assert!(!scope.asset_exists("graph.js").await);
        let path = scope.write_asset("graph.js", b"// graph").await.unwrap();
        assert_eq!(path, root.join("graph.js"));
        assert!(scope.asset_exists("graph.js").await);
        assert_eq!(std::fs::read(&path).unwrap(), b"// graph");
    }

    #[test]
    fn test_corrupt_state_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STATE_FILE), b"{not json").unwrap();

        let scope = StorageScope::open(dir.path()).unwrap();
        assert_eq!(scope.get("anything"), None);
    }

    #[tokio::test]
    async fn test_rejects_path_like_asset_names() {
        let dir = tempfile::tempdir().unwrap();
        let scope = StorageScope::open(dir.path()).unwrap();

        for name in ["", "..", "../evil.js", "a/b.js", STATE_FILE] {
            assert!(
                matches!(scope.write_asset(name, b"x").await, Err(CacheError::State(_))),
                "{name:?} should be rejected"
            );
        }
    }
}
