//! Visualization sessions and their one-shot disposal notification.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::identity::ResourceIdentity;
use crate::surface::{RenderSurface, SurfaceHandle, SurfaceProvider, SurfaceRequest};
use crate::types::{DisposeReason, Document, SurfaceError, VisualizeError, VisualizeResult};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Delivered to disposal listeners, once.
#[derive(Debug, Clone)]
pub struct DisposeEvent {
    pub session_id: SessionId,
    pub identity: ResourceIdentity,
    pub reason: DisposeReason,
}

type Listener = Box<dyn FnOnce(&DisposeEvent) + Send>;

struct SessionInner {
    id: SessionId,
    identity: ResourceIdentity,
    surface: Mutex<Option<Box<dyn RenderSurface>>>,
    disposed: AtomicBool,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
}

/// One live visualization bound to one document.
///
/// Cloning is cheap and every clone refers to the same session. A session is
/// live until [`Session::dispose`] runs (directly, or through the surface's
/// [`DisposeSignal`]); after that every operation except `dispose` fails with
/// [`VisualizeError::SessionDisposed`].
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create the render surface for `document` and wrap it in a session.
    pub fn open(
        identity: ResourceIdentity,
        document: &Document,
        provider: &dyn SurfaceProvider,
    ) -> VisualizeResult<Self> {
        let inner = Arc::new(SessionInner {
            id: SessionId::next(),
            identity,
            surface: Mutex::new(None),
            disposed: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        });

        let closed = DisposeSignal {
            session: Arc::downgrade(&inner),
        };
        let mut surface = provider
            .create(SurfaceRequest {
                identity: &inner.identity,
                document,
                closed,
            })
            .map_err(|source| VisualizeError::SessionCreation {
                identity: inner.identity.clone(),
                source,
            })?;

        if inner.disposed.load(Ordering::Acquire) {
            surface.close();
            return Err(VisualizeError::SessionCreation {
                identity: inner.identity.clone(),
                source: SurfaceError("surface closed during creation".to_string()),
            });
        }

        *inner.surface.lock() = Some(surface);
        Ok(Self { inner })
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.inner.identity
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Handle of the live surface.
    pub fn handle(&self) -> VisualizeResult<SurfaceHandle> {
        let surface = self.inner.surface.lock();
        match surface.as_ref() {
            Some(surface) if !self.is_disposed() => Ok(surface.handle()),
            _ => Err(self.disposed_error()),
        }
    }

    /// Ask the surface to regain focus.
    pub fn bring_to_front(&self) -> VisualizeResult<()> {
        let surface = self.inner.surface.lock();
        match surface.as_ref() {
            Some(surface) if !self.is_disposed() => {
                surface
                    .reveal()
                    .map_err(|source| VisualizeError::Surface {
                        identity: self.inner.identity.clone(),
                        source,
                    })
            }
            _ => Err(self.disposed_error()),
        }
    }

    /// Register a disposal listener. Dropping the returned subscription
    /// unregisters it.
    pub fn on_dispose<F>(&self, callback: F) -> VisualizeResult<DisposeSubscription>
    where
        F: FnOnce(&DisposeEvent) + Send + 'static,
    {
        let mut listeners = self.inner.listeners.lock();
        // Checked under the listener lock so a concurrent dispose either sees
        // this listener or this call sees the disposed flag.
        if self.is_disposed() {
            return Err(self.disposed_error());
        }

        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        listeners.push((id, Box::new(callback)));
        Ok(DisposeSubscription {
            session: Arc::downgrade(&self.inner),
            id,
        })
    }

    /// Move the session to its terminal state. Only the first call has any
    /// effect.
    pub fn dispose(&self, reason: DisposeReason) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let surface = self.inner.surface.lock().take();
        if let Some(mut surface) = surface {
            if reason != DisposeReason::SurfaceClosed {
                surface.close();
            }
        }

        let listeners = std::mem::take(&mut *self.inner.listeners.lock());
        let event = DisposeEvent {
            session_id: self.inner.id,
            identity: self.inner.identity.clone(),
            reason,
        };
        for (_, listener) in listeners {
            listener(&event);
        }
    }

    fn disposed_error(&self) -> VisualizeError {
        VisualizeError::SessionDisposed(self.inner.identity.clone())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("identity", &self.inner.identity)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Given to the render surface; firing it disposes the session.
#[derive(Clone)]
pub struct DisposeSignal {
    session: Weak<SessionInner>,
}

impl DisposeSignal {
    /// Report that the surface has been closed.
    pub fn fire(&self) {
        if let Some(inner) = self.session.upgrade() {
            Session { inner }.dispose(DisposeReason::SurfaceClosed);
        }
    }
}

/// Registration of one disposal listener.
pub struct DisposeSubscription {
    session: Weak<SessionInner>,
    id: u64,
}

impl Drop for DisposeSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.session.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
