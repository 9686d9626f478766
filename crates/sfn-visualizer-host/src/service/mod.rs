//! Wires storage, the asset cache, the logging facade and the surface
//! provider into one visualization manager.

use std::sync::Arc;

use sfn_visualizer::{
    AssetSource, DirectorySource, GraphCache, StaticSource, StorageScope, ToolkitLogger,
    VisualizationManager,
};

use crate::config::{HostConfig, GRAPH_SCRIPT, GRAPH_STYLE};
use crate::outbox::{LogMessageChannel, Notifier};
use crate::surface::HeadlessSurfaces;
use crate::types::HostResult;

const BUNDLED_SCRIPT: &[u8] = include_bytes!("../../assets/graph.js");
const BUNDLED_STYLE: &[u8] = include_bytes!("../../assets/graph.css");

fn bundled_assets() -> StaticSource {
    StaticSource::new()
        .with_asset(GRAPH_SCRIPT.0, BUNDLED_SCRIPT.to_vec())
        .with_asset(GRAPH_STYLE.0, BUNDLED_STYLE.to_vec())
}

/// Everything one host process serves.
pub struct VisualizerService {
    config: HostConfig,
    manager: VisualizationManager,
    surfaces: Arc<HeadlessSurfaces>,
    logger: Arc<ToolkitLogger>,
}

impl VisualizerService {
    /// Open the storage scope and build the manager. Log lines and surface
    /// events are sent through `notifier`.
    pub fn open(config: HostConfig, notifier: Notifier) -> HostResult<Self> {
        let storage = Arc::new(StorageScope::open(config.storage_dir.clone())?);

        let source: Arc<dyn AssetSource> = match &config.assets_dir {
            Some(dir) => Arc::new(DirectorySource::new(dir.clone())),
            None => Arc::new(bundled_assets()),
        };
        let cache = Arc::new(GraphCache::new(config.assets(), source));

        let logger = Arc::new(ToolkitLogger::new(config.log_level));
        logger.log_to_output_channel(Arc::new(LogMessageChannel::new(notifier.clone())))?;
        if let Some(path) = &config.log_file {
            logger.log_to_file(path)?;
        }

        let asset_paths = cache
            .assets()
            .iter()
            .map(|asset| storage.asset_path(&asset.name))
            .collect();
        let surfaces = Arc::new(HeadlessSurfaces::new(notifier, asset_paths));

        let manager =
            VisualizationManager::new(cache, storage, surfaces.clone(), logger.clone());

        tracing::info!(
            "Visualizer storage at {}, assets from {}",
            config.storage_dir.display(),
            config
                .assets_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "bundled copies".to_string())
        );

        Ok(Self {
            config,
            manager,
            surfaces,
            logger,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn manager(&self) -> &VisualizationManager {
        &self.manager
    }

    pub fn surfaces(&self) -> &HeadlessSurfaces {
        &self.surfaces
    }

    pub fn logger(&self) -> &ToolkitLogger {
        &self.logger
    }

    /// Materialize the assets without opening anything.
    pub async fn warm(&self) -> HostResult<usize> {
        self.manager
            .cache()
            .ensure_fresh(self.manager.storage())
            .await?;
        Ok(self.manager.cache().assets().len())
    }

    /// Dispose every session, then release the log sinks.
    pub fn finish(&self) -> HostResult<()> {
        self.manager.shutdown();
        self.logger.shutdown()?;
        Ok(())
    }
}
