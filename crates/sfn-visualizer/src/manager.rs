//! Visualization manager: the identity to session registry.
//!
//! At most one live session exists per [`ResourceIdentity`]. Reuse is decided
//! synchronously; only creating a new session refreshes the asset cache.
//! Creation for one identity is serialized by a per-identity async mutex, so a
//! request that arrives while another is still refreshing the cache waits and
//! then reuses the session the first one created.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::cache::GraphCache;
use crate::identity::ResourceIdentity;
use crate::logger::{Fields, LogLevel, LogMessage, Logger, TracingLogger};
use crate::session::{DisposeEvent, DisposeSubscription, Session};
use crate::storage::StorageScope;
use crate::surface::SurfaceProvider;
use crate::types::{DisposeReason, Document, VisualizeError, VisualizeResult};

/// Creation state shared by every request for one identity.
struct InFlight {
    lock: tokio::sync::Mutex<()>,
    /// Bumped by `document_closed`. A request that saw an older value never
    /// registers its session.
    closes: AtomicU64,
}

struct ManagedSession {
    session: Session,
    subscription: DisposeSubscription,
}

struct ManagerInner {
    cache: Arc<GraphCache>,
    storage: Arc<StorageScope>,
    surfaces: Arc<dyn SurfaceProvider>,
    logger: Arc<dyn Logger>,
    sessions: Mutex<HashMap<ResourceIdentity, ManagedSession>>,
    creating: Mutex<HashMap<ResourceIdentity, Arc<InFlight>>>,
    shut_down: AtomicBool,
}

/// Owns every live visualization session.
pub struct VisualizationManager {
    inner: Arc<ManagerInner>,
}

impl VisualizationManager {
    pub fn new(
        cache: Arc<GraphCache>,
        storage: Arc<StorageScope>,
        surfaces: Arc<dyn SurfaceProvider>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                cache,
                storage,
                surfaces,
                logger,
                sessions: Mutex::new(HashMap::new()),
                creating: Mutex::new(HashMap::new()),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<GraphCache> {
        &self.inner.cache
    }

    pub fn storage(&self) -> &Arc<StorageScope> {
        &self.inner.storage
    }

    /// Visualize whichever document is active, if any.
    pub async fn visualize_active(&self, active: Option<&Document>) -> VisualizeResult<Session> {
        match active {
            Some(document) => self.activate(document).await,
            None => {
                let err = VisualizeError::NoActiveDocument;
                self.inner.log(LogLevel::Error, LogMessage::error(&err), &[]);
                Err(err)
            }
        }
    }

    /// Reuse the session for `document`, or refresh the cache and create one.
    pub async fn activate(&self, document: &Document) -> VisualizeResult<Session> {
        self.ensure_running()?;

        let identity = match ResourceIdentity::resolve(&document.uri) {
            Ok(identity) => identity,
            Err(err) => {
                self.inner.report_failure(&err, &[("uri", &document.uri)]);
                return Err(err);
            }
        };

        if let Some(session) = self.reuse(&identity) {
            return Ok(session);
        }

        let slot = CreationSlot::acquire(&self.inner, &identity);
        let _creating = slot.flight.lock.lock().await;
        self.create(&slot, document).await
    }

    /// The live session for `identity`, if there is one.
    pub fn session(&self, identity: &ResourceIdentity) -> Option<Session> {
        self.inner
            .sessions
            .lock()
            .get(identity)
            .map(|managed| managed.session.clone())
            .filter(|session| !session.is_disposed())
    }

    /// Snapshot of every live session, ordered by identity.
    pub fn managed_sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .inner
            .sessions
            .lock()
            .values()
            .map(|managed| managed.session.clone())
            .filter(|session| !session.is_disposed())
            .collect();
        sessions.sort_by(|a, b| a.identity().cmp(b.identity()));
        sessions
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The document at `uri` was closed; dispose its session and abandon any
    /// creation still under way for it. Returns whether there was either.
    pub fn document_closed(&self, uri: &str) -> VisualizeResult<bool> {
        let identity = ResourceIdentity::resolve(uri)?;

        // Marked before the registry lookup: a creation either sees the mark
        // when it registers, or registers first and is found below.
        let pending = self
            .inner
            .creating
            .lock()
            .get(&identity)
            .map(|flight| flight.closes.fetch_add(1, Ordering::SeqCst))
            .is_some();

        match self.session(&identity) {
            Some(session) => {
                session.dispose(DisposeReason::ResourceClosed);
                Ok(true)
            }
            None => Ok(pending),
        }
    }

    /// Dispose every session and refuse further activations.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let drained: Vec<ManagedSession> = self
            .inner
            .sessions
            .lock()
            .drain()
            .map(|(_, managed)| managed)
            .collect();
        let count = drained.len();

        for ManagedSession {
            session,
            subscription,
        } in drained
        {
            drop(subscription);
            session.dispose(DisposeReason::Shutdown);
        }

        self.inner.log(
            LogLevel::Info,
            LogMessage::Text("Visualization manager shut down"),
            &[("disposed", &count)],
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> VisualizeResult<()> {
        if self.is_shut_down() {
            Err(VisualizeError::ManagerShutDown)
        } else {
            Ok(())
        }
    }

    /// Bring an existing live session forward. A session whose disposal is
    /// under way counts as absent.
    fn reuse(&self, identity: &ResourceIdentity) -> Option<Session> {
        let session = self.session(identity)?;

        match session.bring_to_front() {
            Ok(()) => {}
            Err(VisualizeError::SessionDisposed(_)) => return None,
            Err(err) => self.inner.log(
                LogLevel::Warn,
                LogMessage::error(&err),
                &[("identity", identity)],
            ),
        }

        self.inner.log(
            LogLevel::Debug,
            LogMessage::Text("Reusing existing visualization"),
            &[("identity", identity), ("session", &session.id().as_u64())],
        );
        Some(session)
    }

    /// Runs with the identity's creation slot held.
    async fn create(
        &self,
        slot: &CreationSlot<'_>,
        document: &Document,
    ) -> VisualizeResult<Session> {
        let identity = &slot.identity;

        // Another request may have created it while this one waited.
        if let Some(session) = self.reuse(identity) {
            return Ok(session);
        }

        if let Err(err) = self.inner.cache.ensure_fresh(&self.inner.storage).await {
            let err = VisualizeError::from(err);
            self.inner.report_failure(&err, &[("identity", identity)]);
            return Err(err);
        }

        // Shutdown or a document close may have happened while the cache
        // refreshed.
        self.ensure_running()?;
        if slot.closed_since_acquired() {
            return Err(self.abandoned(identity));
        }

        let session = match Session::open(identity.clone(), document, self.inner.surfaces.as_ref())
        {
            Ok(session) => session,
            Err(err) => {
                self.inner.report_failure(&err, &[("identity", identity)]);
                return Err(err);
            }
        };

        let registry = Arc::downgrade(&self.inner);
        let subscription = session.on_dispose(move |event| forget(&registry, event))?;

        // Checked under the registry lock so a concurrent shutdown drain,
        // document close or surface close cannot miss the new entry.
        let refused = {
            let mut sessions = self.inner.sessions.lock();
            let refusal = if self.is_shut_down() {
                Some((DisposeReason::Shutdown, VisualizeError::ManagerShutDown))
            } else if slot.closed_since_acquired() {
                Some((
                    DisposeReason::ResourceClosed,
                    VisualizeError::ResourceClosed(identity.clone()),
                ))
            } else if session.is_disposed() {
                Some((
                    DisposeReason::SurfaceClosed,
                    VisualizeError::SessionDisposed(identity.clone()),
                ))
            } else {
                None
            };

            match refusal {
                Some(refusal) => Some((refusal, subscription)),
                None => {
                    sessions.insert(
                        identity.clone(),
                        ManagedSession {
                            session: session.clone(),
                            subscription,
                        },
                    );
                    None
                }
            }
        };

        if let Some(((reason, err), subscription)) = refused {
            drop(subscription);
            session.dispose(reason);
            self.inner.log(
                LogLevel::Info,
                LogMessage::error(&err),
                &[("identity", identity)],
            );
            return Err(err);
        }

        self.inner.log(
            LogLevel::Info,
            LogMessage::Text("Created visualization"),
            &[("identity", identity), ("session", &session.id().as_u64())],
        );
        Ok(session)
    }

    fn abandoned(&self, identity: &ResourceIdentity) -> VisualizeError {
        let err = VisualizeError::ResourceClosed(identity.clone());
        self.inner.log(
            LogLevel::Info,
            LogMessage::error(&err),
            &[("identity", identity)],
        );
        err
    }
}

impl ManagerInner {
    /// Write a diagnostic. Records the facade refuses (after its shutdown)
    /// go to `tracing` instead.
    fn log(&self, level: LogLevel, message: LogMessage<'_>, fields: Fields<'_>) {
        if let Err(e) = self.logger.log(level, message, fields) {
            tracing::debug!("Logger refused record ({e})");
            // Never refuses.
            let _ = TracingLogger.log(level, message, fields);
        }
    }

    fn report_failure(&self, err: &VisualizeError, fields: Fields<'_>) {
        self.log(
            LogLevel::Debug,
            LogMessage::Text("Unable to set up visualization surface"),
            fields,
        );
        self.log(LogLevel::Error, LogMessage::error(err), fields);
    }
}

/// Disposal callback: drop the registry entry if it still belongs to the
/// disposed session.
fn forget(registry: &Weak<ManagerInner>, event: &DisposeEvent) {
    let Some(inner) = registry.upgrade() else {
        return;
    };

    let removed = {
        let mut sessions = inner.sessions.lock();
        match sessions.get(&event.identity) {
            Some(managed) if managed.session.id() == event.session_id => {
                sessions.remove(&event.identity)
            }
            _ => None,
        }
    };

    if removed.is_some() {
        inner.log(
            LogLevel::Debug,
            LogMessage::Text("Visualization disposed"),
            &[
                ("identity", &event.identity),
                ("session", &event.session_id.as_u64()),
                ("reason", &format!("{:?}", event.reason)),
            ],
        );
    }
    // Dropped outside the registry lock: releasing the subscription takes the
    // session's listener lock.
    drop(removed);
}

/// Per-identity creation slot, removed from the map when its last user is
/// done (including when the activating future is dropped mid-way).
struct CreationSlot<'a> {
    inner: &'a ManagerInner,
    identity: ResourceIdentity,
    flight: Arc<InFlight>,
    /// `flight.closes` when this request arrived.
    closes_seen: u64,
}

impl<'a> CreationSlot<'a> {
    fn acquire(inner: &'a ManagerInner, identity: &ResourceIdentity) -> Self {
        let flight = inner
            .creating
            .lock()
            .entry(identity.clone())
            .or_insert_with(|| {
                Arc::new(InFlight {
                    lock: tokio::sync::Mutex::new(()),
                    closes: AtomicU64::new(0),
                })
            })
            .clone();
        let closes_seen = flight.closes.load(Ordering::SeqCst);
        Self {
            inner,
            identity: identity.clone(),
            flight,
            closes_seen,
        }
    }

    fn closed_since_acquired(&self) -> bool {
        self.flight.closes.load(Ordering::SeqCst) != self.closes_seen
    }
}

impl Drop for CreationSlot<'_> {
    fn drop(&mut self) {
        let mut creating = self.inner.creating.lock();
        // Only the map and this slot hold it: nobody else is waiting.
        if Arc::strong_count(&self.flight) == 2 {
            creating.remove(&self.identity);
        }
    }
}
