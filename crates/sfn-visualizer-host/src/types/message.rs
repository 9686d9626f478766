//! JSON-RPC 2.0 framing types. Requests and notifications arrive from the
//! client; the host answers with replies and pushes its own notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier: string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
    Null,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::Null => f.write_str("null"),
        }
    }
}

/// One line read from the client. A message with an `id` is a request.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
    Request(Request),
    Notification(Notification),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// A message without an id; never answered. Travels both ways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }

    /// Build a notification whose params serialize from `params`.
    pub fn with_params(method: impl Into<String>, params: &impl Serialize) -> Self {
        let params = match serde_json::to_value(params) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Failed to serialize notification params: {e}");
                None
            }
        };
        Self::new(method, params)
    }
}

/// The answer to one request: `result` on success, `error` otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(ErrorBody),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
}

impl Reply {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn failure(id: RequestId, code: i32, message: String) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Error(ErrorBody { code, message }),
        }
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match &self.outcome {
            Outcome::Error(body) => Some(body),
            Outcome::Result(_) => None,
        }
    }

    /// Reply as a JSON value, for the transport and tests.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_carries_exactly_one_outcome() {
        let ok = Reply::success(RequestId::Number(7), json!({"sessions": []})).to_value();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 7, "result": {"sessions": []}}));

        let failed = Reply::failure(RequestId::String("a".into()), -32601, "nope".into());
        assert_eq!(failed.error().map(|e| e.code), Some(-32601));
        assert_eq!(
            failed.to_value(),
            json!({"jsonrpc": "2.0", "id": "a", "error": {"code": -32601, "message": "nope"}})
        );
    }

    #[test]
    fn test_id_decides_request_or_notification() {
        let msg: IncomingMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
        assert!(matches!(msg, IncomingMessage::Request(Request { id: RequestId::Null, .. })));

        let msg: IncomingMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"exit"}"#).unwrap();
        assert!(matches!(msg, IncomingMessage::Notification(_)));
    }
}
