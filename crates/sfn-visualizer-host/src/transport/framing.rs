//! Newline-delimited JSON framing.

use serde::Serialize;

use crate::types::{HostError, HostResult, IncomingMessage};

/// Parse a single line of text as a JSON-RPC message.
pub fn parse_message(line: &str) -> HostResult<IncomingMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(HostError::ParseError("Empty message".to_string()));
    }

    serde_json::from_str(trimmed).map_err(|e| HostError::ParseError(e.to_string()))
}

/// Serialize a message as one line, newline included.
pub fn frame_message(value: &impl Serialize) -> HostResult<String> {
    let mut json = serde_json::to_string(value)?;
    json.push('\n');
    Ok(json)
}
