//! Test doubles for the cache, surface and logging collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cache::{AssetSource, AssetSpec};
use crate::logger::OutputChannel;
use crate::session::DisposeSignal;
use crate::surface::{RenderSurface, SurfaceHandle, SurfaceProvider, SurfaceRequest};
use crate::types::{CacheError, CacheResult, SurfaceError};

/// Serves synthetic bytes and counts fetches.
#[derive(Default)]
pub struct CountingSource {
    fetches: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingSource {
    pub fn slow(delay: Duration) -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetSource for CountingSource {
    async fn fetch(&self, asset: &AssetSpec) -> CacheResult<Vec<u8>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(format!("/* {} @ {} */", asset.name, asset.revision).into_bytes())
    }
}

/// Fails its first `failures` fetches, then behaves.
pub struct FlakySource {
    calls: AtomicUsize,
    failures: usize,
    delay: Option<Duration>,
}

impl FlakySource {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures,
            delay: None,
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetSource for FlakySource {
    async fn fetch(&self, asset: &AssetSpec) -> CacheResult<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if call < self.failures {
            return Err(CacheError::Fetch {
                asset: asset.name.clone(),
                reason: "simulated outage".to_string(),
            });
        }
        Ok(b"/* ok */".to_vec())
    }
}

type CreateHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct SurfacesState {
    next_handle: u64,
    created: usize,
    fail_next: bool,
    on_create: Option<CreateHook>,
    reveals: HashMap<SurfaceHandle, usize>,
    closes: HashMap<SurfaceHandle, usize>,
    signals: HashMap<SurfaceHandle, DisposeSignal>,
}

/// Surface provider that records every call and can simulate user closes.
#[derive(Default, Clone)]
pub struct RecordingSurfaces {
    state: Arc<Mutex<SurfacesState>>,
}

impl RecordingSurfaces {
    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    pub fn reveals(&self, handle: SurfaceHandle) -> usize {
        self.state.lock().reveals.get(&handle).copied().unwrap_or(0)
    }

    pub fn closes(&self, handle: SurfaceHandle) -> usize {
        self.state.lock().closes.get(&handle).copied().unwrap_or(0)
    }

    pub fn fail_next_create(&self) {
        self.state.lock().fail_next = true;
    }

    /// Run `hook` inside the next `create`, before the surface exists.
    pub fn on_next_create(&self, hook: impl FnOnce() + Send + 'static) {
        self.state.lock().on_create = Some(Box::new(hook));
    }

    /// Close the surface as a user would, outside of its session.
    pub fn user_close(&self, handle: SurfaceHandle) {
        let signal = self.state.lock().signals.remove(&handle);
        if let Some(signal) = signal {
            signal.fire();
        }
    }
}

impl SurfaceProvider for RecordingSurfaces {
    fn create(&self, request: SurfaceRequest<'_>) -> Result<Box<dyn RenderSurface>, SurfaceError> {
        let hook = self.state.lock().on_create.take();
        if let Some(hook) = hook {
            hook();
        }

        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next) {
            return Err(SurfaceError("simulated surface failure".to_string()));
        }

        state.next_handle += 1;
        state.created += 1;
        let handle = SurfaceHandle::new(state.next_handle);
        state.signals.insert(handle, request.closed);

        Ok(Box::new(RecordingSurface {
            handle,
            state: self.state.clone(),
        }))
    }
}

struct RecordingSurface {
    handle: SurfaceHandle,
    state: Arc<Mutex<SurfacesState>>,
}

impl RenderSurface for RecordingSurface {
    fn handle(&self) -> SurfaceHandle {
        self.handle
    }

    fn reveal(&self) -> Result<(), SurfaceError> {
        *self.state.lock().reveals.entry(self.handle).or_default() += 1;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        *state.closes.entry(self.handle).or_default() += 1;
        state.signals.remove(&self.handle);
    }
}

/// Output channel that keeps every line in memory.
#[derive(Default)]
pub struct MemoryChannel {
    lines: Mutex<Vec<String>>,
}

impl MemoryChannel {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl OutputChannel for MemoryChannel {
    fn append_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}
