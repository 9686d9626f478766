//! Shared cache of the graph rendering assets.
//!
//! `ensure_fresh` materializes every asset into a [`StorageScope`] once per
//! process. Concurrent callers share a single refresh. A failed refresh leaves
//! the cache uninitialized so the next call tries again.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::storage::StorageScope;
use crate::types::{CacheError, CacheResult};

/// One named asset and the source revision it should be materialized from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSpec {
    /// File name inside the storage scope.
    pub name: String,
    /// Storage state key recording the revision last written.
    pub state_key: String,
    /// Source revision (a URL or version tag). A change forces a re-fetch.
    pub revision: String,
}

impl AssetSpec {
    pub fn new(
        name: impl Into<String>,
        state_key: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            state_key: state_key.into(),
            revision: revision.into(),
        }
    }
}

/// Produces the bytes of an asset.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, asset: &AssetSpec) -> CacheResult<Vec<u8>>;
}

/// Copies assets from a bundled directory.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl AssetSource for DirectorySource {
    async fn fetch(&self, asset: &AssetSpec) -> CacheResult<Vec<u8>> {
        let path = self.dir.join(&asset.name);
        tokio::fs::read(&path).await.map_err(|e| CacheError::Fetch {
            asset: asset.name.clone(),
            reason: format!("{}: {e}", path.display()),
        })
    }
}

/// Serves assets from bytes held in memory (typically compiled in).
#[derive(Default)]
pub struct StaticSource {
    assets: HashMap<String, Vec<u8>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.assets.insert(name.into(), bytes.into());
        self
    }
}

#[async_trait]
impl AssetSource for StaticSource {
    async fn fetch(&self, asset: &AssetSpec) -> CacheResult<Vec<u8>> {
        self.assets
            .get(&asset.name)
            .cloned()
            .ok_or_else(|| CacheError::Fetch {
                asset: asset.name.clone(),
                reason: "not bundled".to_string(),
            })
    }
}

/// Process-wide freshness tracker for the graph assets.
pub struct GraphCache {
    assets: Vec<AssetSpec>,
    source: Arc<dyn AssetSource>,
    fresh: AtomicBool,
    refreshes: AtomicU64,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl GraphCache {
    pub fn new(assets: Vec<AssetSpec>, source: Arc<dyn AssetSource>) -> Self {
        Self {
            assets,
            source,
            fresh: AtomicBool::new(false),
            refreshes: AtomicU64::new(0),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn assets(&self) -> &[AssetSpec] {
        &self.assets
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh.load(Ordering::Acquire)
    }

    /// Number of completed materialization passes in this process.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Acquire)
    }

    /// Make sure every asset is present and current in `storage`.
    pub async fn ensure_fresh(&self, storage: &StorageScope) -> CacheResult<()> {
        if self.is_fresh() {
            return Ok(());
        }

        let _refresh = self.refresh_lock.lock().await;
        if self.is_fresh() {
            return Ok(());
        }

        tracing::debug!(
            "Refreshing {} graph assets in {}",
            self.assets.len(),
            storage.root().display()
        );

        futures::future::try_join_all(
            self.assets
                .iter()
                .map(|asset| self.update_asset(storage, asset)),
        )
        .await?;

        self.refreshes.fetch_add(1, Ordering::AcqRel);
        self.fresh.store(true, Ordering::Release);
        tracing::info!("Graph asset cache is fresh");
        Ok(())
    }

    /// Drop freshness so the next `ensure_fresh` redoes the work.
    pub async fn reset(&self) {
        let _refresh = self.refresh_lock.lock().await;
        self.fresh.store(false, Ordering::Release);
        tracing::debug!("Graph asset cache reset");
    }

    async fn update_asset(&self, storage: &StorageScope, asset: &AssetSpec) -> CacheResult<()> {
        let recorded = storage.get(&asset.state_key);
        let exists = storage.asset_exists(&asset.name).await;

        if exists && recorded.as_deref() == Some(asset.revision.as_str()) {
            tracing::debug!("Asset {} is current ({})", asset.name, asset.revision);
            return Ok(());
        }

        let result = async {
            let bytes = self.source.fetch(asset).await?;
            storage.write_asset(&asset.name, &bytes).await?;
            storage.update(&asset.state_key, &asset.revision).await
        }
        .await;

        match &result {
            Ok(()) => tracing::info!("Cached asset {} at revision {}", asset.name, asset.revision),
            Err(e) => tracing::error!("Failed to update graph asset {}: {e}", asset.name),
        }
        result
    }
}
