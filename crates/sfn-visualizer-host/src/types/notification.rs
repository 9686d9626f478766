//! Notifications sent to the client.

use serde::{Deserialize, Serialize};

use sfn_visualizer::{ResourceIdentity, SurfaceHandle};

pub const SURFACE_OPENED: &str = "surface/opened";
pub const SURFACE_REVEALED: &str = "surface/revealed";
pub const SURFACE_CLOSED: &str = "surface/closed";
pub const LOG_MESSAGE: &str = "window/logMessage";
pub const SHOW_MESSAGE: &str = "window/showMessage";

pub const SERVER_NOTIFICATIONS: &[&str] = &[
    SURFACE_OPENED,
    SURFACE_REVEALED,
    SURFACE_CLOSED,
    LOG_MESSAGE,
    SHOW_MESSAGE,
];

/// Client notification: a document was closed in the editor.
pub const DID_CLOSE: &str = "textDocument/didClose";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceOpenedParams {
    pub surface: SurfaceHandle,
    pub identity: ResourceIdentity,
    pub uri: String,
    /// Materialized asset files the surface loads.
    pub assets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceRevealedParams {
    pub surface: SurfaceHandle,
    pub identity: ResourceIdentity,
}

/// Who closed a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseOrigin {
    User,
    Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceClosedParams {
    pub surface: SurfaceHandle,
    pub identity: ResourceIdentity,
    pub origin: CloseOrigin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessageParams {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowMessageParams {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub message: String,
}
