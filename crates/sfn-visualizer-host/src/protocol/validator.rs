//! JSON-RPC message validation and parameter decoding.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{HostError, HostResult, Request, JSONRPC_VERSION};

/// Validate that a JSON-RPC request is well-formed.
pub fn validate_request(request: &Request) -> HostResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(HostError::InvalidRequest(format!(
            "Expected jsonrpc version \"{JSONRPC_VERSION}\", got \"{}\"",
            request.jsonrpc
        )));
    }

    if request.method.is_empty() {
        return Err(HostError::InvalidRequest(
            "Method name must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Decode required params.
pub fn required_params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> HostResult<T> {
    let params =
        params.ok_or_else(|| HostError::InvalidParams(format!("{method} params required")))?;
    serde_json::from_value(params).map_err(|e| HostError::InvalidParams(e.to_string()))
}

/// Decode optional params, falling back to `T::default()`.
pub fn optional_params<T: DeserializeOwned + Default>(params: Option<Value>) -> HostResult<T> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(params) => {
            serde_json::from_value(params).map_err(|e| HostError::InvalidParams(e.to_string()))
        }
    }
}
