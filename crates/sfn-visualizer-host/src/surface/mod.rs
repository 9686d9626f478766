//! Headless render surfaces: every surface event becomes a client
//! notification, and the client can close a surface the way a user closes a
//! panel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use sfn_visualizer::{
    DisposeSignal, RenderSurface, ResourceIdentity, SurfaceError, SurfaceHandle,
    SurfaceProvider, SurfaceRequest,
};

use crate::outbox::Notifier;
use crate::types::{
    CloseOrigin, SurfaceClosedParams, SurfaceOpenedParams, SurfaceRevealedParams,
    SURFACE_CLOSED, SURFACE_OPENED, SURFACE_REVEALED,
};

struct OpenSurface {
    handle: SurfaceHandle,
    closed: DisposeSignal,
}

struct SurfaceTable {
    notifier: Notifier,
    open: Mutex<HashMap<ResourceIdentity, OpenSurface>>,
}

impl SurfaceTable {
    fn closed(&self, handle: SurfaceHandle, identity: &ResourceIdentity, origin: CloseOrigin) {
        self.notifier.notify(
            SURFACE_CLOSED,
            &SurfaceClosedParams {
                surface: handle,
                identity: identity.clone(),
                origin,
            },
        );
    }
}

/// Surface provider for the stdio host.
pub struct HeadlessSurfaces {
    table: Arc<SurfaceTable>,
    assets: Vec<PathBuf>,
    next_handle: AtomicU64,
}

impl HeadlessSurfaces {
    /// `assets` are the materialized files each surface is told to load.
    pub fn new(notifier: Notifier, assets: Vec<PathBuf>) -> Self {
        Self {
            table: Arc::new(SurfaceTable {
                notifier,
                open: Mutex::new(HashMap::new()),
            }),
            assets,
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn open_count(&self) -> usize {
        self.table.open.lock().len()
    }

    /// Close the surface showing `identity` as if the user dismissed it.
    /// Returns false when no surface is open for it.
    pub fn close_by_user(&self, identity: &ResourceIdentity) -> bool {
        let removed = self.table.open.lock().remove(identity);
        let Some(surface) = removed else {
            return false;
        };

        self.table.closed(surface.handle, identity, CloseOrigin::User);
        surface.closed.fire();
        true
    }
}

impl SurfaceProvider for HeadlessSurfaces {
    fn create(&self, request: SurfaceRequest<'_>) -> Result<Box<dyn RenderSurface>, SurfaceError> {
        let handle = SurfaceHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let identity = request.identity.clone();

        let replaced = self.table.open.lock().insert(
            identity.clone(),
            OpenSurface {
                handle,
                closed: request.closed,
            },
        );
        if let Some(stale) = replaced {
            tracing::warn!("Surface {} for {identity} was still registered", stale.handle);
        }

        self.table.notifier.notify(
            SURFACE_OPENED,
            &SurfaceOpenedParams {
                surface: handle,
                identity: identity.clone(),
                uri: request.document.uri.clone(),
                assets: self
                    .assets
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect(),
            },
        );
        tracing::debug!("Opened {handle} for {identity}");

        Ok(Box::new(HeadlessSurface {
            handle,
            identity,
            table: self.table.clone(),
        }))
    }
}

struct HeadlessSurface {
    handle: SurfaceHandle,
    identity: ResourceIdentity,
    table: Arc<SurfaceTable>,
}

impl RenderSurface for HeadlessSurface {
    fn handle(&self) -> SurfaceHandle {
        self.handle
    }

    fn reveal(&self) -> Result<(), SurfaceError> {
        self.table.notifier.notify(
            SURFACE_REVEALED,
            &SurfaceRevealedParams {
                surface: self.handle,
                identity: self.identity.clone(),
            },
        );
        Ok(())
    }

    fn close(&mut self) {
        let mut open = self.table.open.lock();
        if open.get(&self.identity).map(|s| s.handle) == Some(self.handle) {
            open.remove(&self.identity);
        }
        drop(open);

        self.table
            .closed(self.handle, &self.identity, CloseOrigin::Session);
    }
}
