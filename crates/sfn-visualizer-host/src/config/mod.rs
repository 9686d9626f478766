//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use sfn_visualizer::{AssetSpec, LogLevel};

pub const STORAGE_ENV: &str = "SFN_VIZ_STORAGE";
pub const ASSETS_ENV: &str = "SFN_VIZ_ASSETS";

/// File names of the graph assets, with the storage key recording each one's
/// last materialized revision.
pub const GRAPH_SCRIPT: (&str, &str) = ("graph.js", "graph.script.revision");
pub const GRAPH_STYLE: (&str, &str) = ("graph.css", "graph.style.revision");

/// Resolved host settings.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub storage_dir: PathBuf,
    /// Directory to copy assets from; `None` serves the compiled-in copies.
    pub assets_dir: Option<PathBuf>,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
}

impl HostConfig {
    pub fn resolve(
        storage: Option<&str>,
        assets: Option<&str>,
        log_level: LogLevel,
        log_file: Option<&str>,
    ) -> Self {
        Self {
            storage_dir: resolve_storage_dir(storage),
            assets_dir: resolve_assets_dir(assets),
            log_level,
            log_file: log_file.map(PathBuf::from),
        }
    }

    /// Defaults rooted at `storage_dir`.
    pub fn in_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            assets_dir: None,
            log_level: LogLevel::Info,
            log_file: None,
        }
    }

    pub fn assets(&self) -> Vec<AssetSpec> {
        default_assets(&asset_revision(self.assets_dir.as_deref()))
    }
}

/// Resolve the storage directory.
pub fn resolve_storage_dir(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var(STORAGE_ENV) {
        return PathBuf::from(env_path);
    }

    let cwd_storage = PathBuf::from(".sfn-visualizer");
    if cwd_storage.is_dir() {
        return cwd_storage;
    }

    resolve_default_storage_dir()
}

fn resolve_default_storage_dir() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".sfn-visualizer")
}

/// Resolve the asset source directory, if one is configured.
pub fn resolve_assets_dir(explicit: Option<&str>) -> Option<PathBuf> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(ASSETS_ENV).ok())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Revision tag for the configured asset source. Switching sources, or
/// upgrading the host, makes every asset stale.
pub fn asset_revision(assets_dir: Option<&Path>) -> String {
    match assets_dir {
        Some(dir) => format!("dir:{}", dir.display()),
        None => format!("bundled:{}", env!("CARGO_PKG_VERSION")),
    }
}

pub fn default_assets(revision: &str) -> Vec<AssetSpec> {
    [GRAPH_SCRIPT, GRAPH_STYLE]
        .into_iter()
        .map(|(name, key)| AssetSpec::new(name, key, revision))
        .collect()
}
