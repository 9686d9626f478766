//! Request dispatcher: receives JSON-RPC messages and routes them to the
//! visualization service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use sfn_visualizer::{LogLevel, ResourceIdentity, Session, VisualizeError};

use crate::config::HostConfig;
use crate::outbox::{Notifier, Outbox};
use crate::service::VisualizerService;
use crate::types::*;

use super::validator::{optional_params, required_params, validate_request};

/// Shown to the user whenever a visualization cannot be produced; details go
/// to the log.
pub const RENDER_FAILURE_MESSAGE: &str =
    "There was an error rendering State Machine Graph, check logs for details.";

pub struct ProtocolHandler {
    service: Arc<VisualizerService>,
    notifier: Notifier,
    outbox: Outbox,
    initialized: AtomicBool,
}

impl ProtocolHandler {
    pub fn new(service: Arc<VisualizerService>, notifier: Notifier, outbox: Outbox) -> Self {
        Self {
            service,
            notifier,
            outbox,
            initialized: AtomicBool::new(false),
        }
    }

    /// Build the service for `config` and a handler around it.
    pub fn open(config: HostConfig) -> HostResult<Self> {
        let (notifier, outbox) = Outbox::channel();
        let service = VisualizerService::open(config, notifier.clone())?;
        Ok(Self::new(Arc::new(service), notifier, outbox))
    }

    pub fn service(&self) -> &Arc<VisualizerService> {
        &self.service
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Notifications queued since the last call.
    pub fn drain_notifications(&self) -> Vec<Notification> {
        self.outbox.drain()
    }

    pub async fn handle_message(&self, msg: IncomingMessage) -> Option<Value> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(req).await.to_value()),
            IncomingMessage::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
        }
    }

    async fn handle_request(&self, request: Request) -> Reply {
        if let Err(e) = validate_request(&request) {
            return e.to_reply(request.id);
        }

        let id = request.id.clone();
        match self.dispatch_request(request).await {
            Ok(value) => Reply::success(id, value),
            Err(e) => {
                tracing::debug!("Request {id} failed: {e}");
                e.to_reply(id)
            }
        }
    }

    async fn dispatch_request(&self, request: Request) -> HostResult<Value> {
        let params = request.params;
        match request.method.as_str() {
            "initialize" => self.handle_initialize(params),
            "ping" => Ok(json!({})),
            "visualize" => self.handle_visualize(params).await,
            "surface/close" => self.handle_surface_close(params),
            "sessions/list" => Ok(self.handle_sessions_list()),
            "cache/status" => Ok(self.handle_cache_status().await),
            "cache/reset" => self.handle_cache_reset().await,
            "log/setLevel" => self.handle_set_log_level(params),
            "shutdown" => Ok(self.handle_shutdown()),
            _ => Err(HostError::MethodNotFound(request.method.clone())),
        }
    }

    async fn handle_notification(&self, notification: Notification) {
        match notification.method.as_str() {
            "initialized" => {
                self.initialized.store(true, Ordering::Release);
                tracing::info!("Handshake complete");
            }
            DID_CLOSE => {
                let closed = required_params::<UriParams>(DID_CLOSE, notification.params)
                    .and_then(|params| {
                        Ok(self.service.manager().document_closed(&params.uri)?)
                    });
                match closed {
                    Ok(true) => tracing::debug!("Closed visualization for closed document"),
                    Ok(false) => {}
                    Err(e) => tracing::warn!("Ignoring {DID_CLOSE}: {e}"),
                }
            }
            "exit" => tracing::info!("Exit requested"),
            _ => {
                tracing::debug!("Unknown notification: {}", notification.method);
            }
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> HostResult<Value> {
        let params: InitializeParams = required_params("initialize", params)?;

        if let Some(version) = params.protocol_version.as_deref() {
            if version != PROTOCOL_VERSION {
                tracing::warn!(
                    "Client requested protocol version {version}, server supports {PROTOCOL_VERSION}. Proceeding with server version."
                );
            }
        }
        if let Some(client) = &params.client_info {
            tracing::info!("Initialized with client: {} v{}", client.name, client.version);
        }

        Ok(serde_json::to_value(InitializeResult::default_result())?)
    }

    async fn handle_visualize(&self, params: Option<Value>) -> HostResult<Value> {
        let params: VisualizeParams = optional_params(params)?;

        let visualized = self
            .service
            .manager()
            .visualize_active(params.document.as_ref())
            .await
            .and_then(|session| session_summary(&session));

        match visualized {
            Ok(summary) => Ok(summary),
            // The user closed the document; nothing to report.
            Err(e @ VisualizeError::ResourceClosed(_)) => Err(e.into()),
            Err(e) => {
                self.notifier.notify(
                    SHOW_MESSAGE,
                    &ShowMessageParams {
                        kind: MessageType::Error,
                        message: RENDER_FAILURE_MESSAGE.to_string(),
                    },
                );
                Err(e.into())
            }
        }
    }

    fn handle_surface_close(&self, params: Option<Value>) -> HostResult<Value> {
        let params: UriParams = required_params("surface/close", params)?;
        let identity = ResourceIdentity::resolve(&params.uri)?;
        let closed = self.service.surfaces().close_by_user(&identity);
        Ok(json!({ "identity": identity, "closed": closed }))
    }

    fn handle_sessions_list(&self) -> Value {
        let sessions: Vec<Value> = self
            .service
            .manager()
            .managed_sessions()
            .iter()
            .filter_map(|session| session_summary(session).ok())
            .collect();
        json!({ "sessions": sessions })
    }

    async fn handle_cache_status(&self) -> Value {
        let manager = self.service.manager();
        let cache = manager.cache();
        let storage = manager.storage();

        let mut assets = Vec::with_capacity(cache.assets().len());
        for asset in cache.assets() {
            assets.push(json!({
                "name": asset.name,
                "revision": asset.revision,
                "recordedRevision": storage.get(&asset.state_key),
                "path": storage.asset_path(&asset.name).display().to_string(),
                "present": storage.asset_exists(&asset.name).await,
            }));
        }

        json!({
            "fresh": cache.is_fresh(),
            "refreshCount": cache.refresh_count(),
            "storage": storage.root().display().to_string(),
            "assets": assets,
        })
    }

    async fn handle_cache_reset(&self) -> HostResult<Value> {
        let cache = self.service.manager().cache();
        cache.reset().await;
        Ok(json!({ "fresh": cache.is_fresh() }))
    }

    fn handle_set_log_level(&self, params: Option<Value>) -> HostResult<Value> {
        let params: SetLogLevelParams = required_params("log/setLevel", params)?;
        let level: LogLevel = params.level.parse().map_err(HostError::InvalidParams)?;
        self.service.logger().set_log_level(level)?;
        Ok(json!({ "level": level }))
    }

    fn handle_shutdown(&self) -> Value {
        tracing::info!("Shutdown requested");
        self.service.manager().shutdown();
        json!({})
    }
}

fn session_summary(session: &Session) -> sfn_visualizer::VisualizeResult<Value> {
    Ok(json!({
        "sessionId": session.id(),
        "identity": session.identity(),
        "surface": session.handle()?,
    }))
}
