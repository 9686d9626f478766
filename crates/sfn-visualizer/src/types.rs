//! Core data types and errors shared across the visualizer.

use serde::{Deserialize, Serialize};

use crate::identity::ResourceIdentity;

/// An open text document holding a state machine definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub uri: String,
    #[serde(default)]
    pub text: String,
}

impl Document {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            text: text.into(),
        }
    }
}

/// Why a session left the live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposeReason {
    /// The render surface was closed (usually by the user).
    SurfaceClosed,
    /// The underlying document was closed.
    ResourceClosed,
    /// The owning manager shut down.
    Shutdown,
}

/// Errors raised while refreshing the shared asset cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("Failed to fetch asset {asset}: {reason}")]
    Fetch { asset: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage state error: {0}")]
    State(String),
}

/// Errors raised by the render surface collaborator.
#[derive(thiserror::Error, Debug)]
#[error("Render surface error: {0}")]
pub struct SurfaceError(pub String);

/// Errors surfaced by visualization activation and session use.
#[derive(thiserror::Error, Debug)]
pub enum VisualizeError {
    #[error("Could not get active document for state machine render")]
    NoActiveDocument,

    #[error("Could not resolve resource identity from '{uri}': {reason}")]
    IdentityResolution { uri: String, reason: String },

    #[error("Cache refresh failed")]
    CacheRefresh(#[from] CacheError),

    #[error("Session creation failed for {identity}")]
    SessionCreation {
        identity: ResourceIdentity,
        #[source]
        source: SurfaceError,
    },

    #[error("Render surface failed for {identity}")]
    Surface {
        identity: ResourceIdentity,
        #[source]
        source: SurfaceError,
    },

    #[error("Document {0} was closed before its visualization opened")]
    ResourceClosed(ResourceIdentity),

    #[error("Session for {0} has been disposed")]
    SessionDisposed(ResourceIdentity),

    #[error("Visualization manager has shut down")]
    ManagerShutDown,
}

/// Errors raised by the logging facade.
#[derive(thiserror::Error, Debug)]
pub enum LoggerError {
    #[error("Cannot write to disposed logger")]
    Disposed,

    #[error("Log sink error: {0}")]
    Io(#[from] std::io::Error),
}

pub type VisualizeResult<T> = Result<T, VisualizeError>;
pub type CacheResult<T> = Result<T, CacheError>;
pub type LoggerResult<T> = Result<T, LoggerError>;
