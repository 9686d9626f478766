//! Initialization handshake types.

use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "2025-01-01";
pub const SERVER_NAME: &str = "sfn-visualizer-host";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request methods the host answers.
pub const METHODS: &[&str] = &[
    "initialize",
    "ping",
    "visualize",
    "surface/close",
    "sessions/list",
    "cache/status",
    "cache/reset",
    "log/setLevel",
    "shutdown",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub client_info: Option<Implementation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    pub methods: Vec<String>,
    /// Notifications the host may send without being asked.
    pub notifications: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
}

impl ServerCapabilities {
    pub fn default_capabilities() -> Self {
        Self {
            methods: METHODS.iter().map(|m| m.to_string()).collect(),
            notifications: super::notification::SERVER_NOTIFICATIONS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl InitializeResult {
    pub fn default_result() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default_capabilities(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        }
    }
}
