//! SfnVisualizer: session registry and shared asset cache for rendering
//! state machine definitions as graphs.

pub mod cache;
pub mod identity;
pub mod logger;
pub mod manager;
pub mod session;
pub mod storage;
pub mod surface;
pub mod types;

#[cfg(test)]
mod testing;

pub use cache::{AssetSource, AssetSpec, DirectorySource, GraphCache, StaticSource};
pub use identity::ResourceIdentity;
pub use logger::{
    Fields, LogLevel, LogMessage, Logger, LoggerExt, OutputChannel, ToolkitLogger, TracingLogger,
};
pub use manager::VisualizationManager;
pub use session::{DisposeEvent, DisposeSignal, DisposeSubscription, Session, SessionId};
pub use storage::StorageScope;
pub use surface::{RenderSurface, SurfaceHandle, SurfaceProvider, SurfaceRequest};
pub use types::*;
