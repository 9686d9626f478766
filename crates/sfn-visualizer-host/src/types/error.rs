//! Host errors and their JSON-RPC error codes.

use sfn_visualizer::{CacheError, LoggerError, VisualizeError};

use super::message::{Reply, RequestId};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Visualizer-specific error codes.
pub mod visualizer_error_codes {
    pub const NO_ACTIVE_DOCUMENT: i32 = -32850;
    pub const INVALID_DOCUMENT_URI: i32 = -32851;
    pub const CACHE_REFRESH_FAILED: i32 = -32852;
    pub const SURFACE_FAILED: i32 = -32853;
    pub const SESSION_DISPOSED: i32 = -32854;
    pub const SHUT_DOWN: i32 = -32855;
    pub const LOGGER_DISPOSED: i32 = -32856;
    pub const DOCUMENT_CLOSED: i32 = -32857;
}

#[derive(thiserror::Error, Debug)]
pub enum HostError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Visualize(#[from] VisualizeError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Logger(#[from] LoggerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HostError {
    pub fn code(&self) -> i32 {
        use error_codes::*;
        use visualizer_error_codes::*;
        match self {
            HostError::ParseError(_) => PARSE_ERROR,
            HostError::InvalidRequest(_) => INVALID_REQUEST,
            HostError::MethodNotFound(_) => METHOD_NOT_FOUND,
            HostError::InvalidParams(_) => INVALID_PARAMS,
            HostError::Io(_) => INTERNAL_ERROR,
            HostError::Json(_) => PARSE_ERROR,
            HostError::Visualize(e) => match e {
                VisualizeError::NoActiveDocument => NO_ACTIVE_DOCUMENT,
                VisualizeError::IdentityResolution { .. } => INVALID_DOCUMENT_URI,
                VisualizeError::CacheRefresh(_) => CACHE_REFRESH_FAILED,
                VisualizeError::SessionCreation { .. } | VisualizeError::Surface { .. } => {
                    SURFACE_FAILED
                }
                VisualizeError::ResourceClosed(_) => DOCUMENT_CLOSED,
                VisualizeError::SessionDisposed(_) => SESSION_DISPOSED,
                VisualizeError::ManagerShutDown => SHUT_DOWN,
            },
            HostError::Cache(_) => CACHE_REFRESH_FAILED,
            HostError::Logger(LoggerError::Disposed) => LOGGER_DISPOSED,
            HostError::Logger(LoggerError::Io(_)) => INTERNAL_ERROR,
        }
    }

    /// The error message carries every cause, joined with `": "`.
    pub fn to_reply(&self, id: RequestId) -> Reply {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.ends_with(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        Reply::failure(id, self.code(), message)
    }
}

pub type HostResult<T> = Result<T, HostError>;
