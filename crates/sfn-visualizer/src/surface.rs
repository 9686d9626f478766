//! Render surface collaborator interface.

use serde::{Deserialize, Serialize};

use crate::identity::ResourceIdentity;
use crate::session::DisposeSignal;
use crate::types::{Document, SurfaceError};

/// Opaque handle to a presentation surface, assigned by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Everything a provider gets when asked for a new surface.
pub struct SurfaceRequest<'a> {
    pub identity: &'a ResourceIdentity,
    pub document: &'a Document,
    /// Fire when the surface is closed by anyone other than its session.
    pub closed: DisposeSignal,
}

/// Creates presentation surfaces for documents.
pub trait SurfaceProvider: Send + Sync {
    fn create(&self, request: SurfaceRequest<'_>) -> Result<Box<dyn RenderSurface>, SurfaceError>;
}

/// A live presentation surface.
pub trait RenderSurface: Send {
    fn handle(&self) -> SurfaceHandle;

    /// Give the surface user focus.
    fn reveal(&self) -> Result<(), SurfaceError>;

    /// Tear the surface down. Called once, by the owning session.
    fn close(&mut self);
}
