//! Wire types
//!
//! Two protocols meet in the relay:
//! - the relay ⇄ host-plugin envelopes (requests, replies, events, handshake)
//! - MCP JSON-RPC 2.0 between the agent and the relay

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelayError, Result};

// ============================================================================
// Relay ⇄ host envelopes
// ============================================================================

/// A forwarded call as seen by the host plugin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestEnvelope {
    pub id: String,
    pub method: String,
    pub params: Value,
    pub channel: String,
}

impl RequestEnvelope {
    pub fn new(id: String, method: String, params: Value, channel: String) -> Self {
        Self {
            id,
            method,
            params,
            channel,
        }
    }
}

/// Messages the relay sends to the host (socket frames or poll bodies)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayMessage {
    /// Forwarded call
    Request(RequestEnvelope),
    /// Handshake sent as soon as a socket connects
    Ready {
        server: String,
        version: String,
        #[serde(rename = "connectionId")]
        connection_id: String,
    },
    /// Poll answer when the queue is empty
    Idle,
}

/// Reply from the host for a forwarded call
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyEnvelope {
    pub id: String,
    pub outcome: std::result::Result<Value, String>,
}

/// Out-of-band notification pushed by the host
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub event: String,
    pub payload: Value,
    pub timestamp: Option<i64>,
    pub channel: Option<String>,
}

/// Classified inbound host message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Reply(ReplyEnvelope),
    Event(EventEnvelope),
    /// Typed message the relay has no use for (`ping`, `hello`, ...)
    Ignored(String),
}

impl Inbound {
    /// Classify a decoded JSON message from the host.
    ///
    /// `event` wins over `id`; a message with neither but a `type` is
    /// ignored; anything else is malformed.
    pub fn classify(message: Value) -> Result<Self> {
        let Value::Object(mut map) = message else {
            return Err(RelayError::validation("Host message must be a JSON object"));
        };

        if let Some(event) = map.remove("event") {
            let name = match event {
                Value::String(s) if !s.is_empty() => s,
                _ => {
                    return Err(RelayError::validation(
                        "Event message must carry a non-empty event name",
                    ))
                }
            };
            let timestamp = map.get("timestamp").and_then(|t| {
                t.as_i64().or_else(|| t.as_f64().map(|f| f as i64))
            });
            let channel = map
                .get("channel")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(String::from);
            return Ok(Inbound::Event(EventEnvelope {
                event: name,
                payload: map.remove("payload").unwrap_or(Value::Null),
                timestamp,
                channel,
            }));
        }

        if let Some(Value::String(id)) = map.remove("id") {
            let outcome = match map.remove("error") {
                Some(Value::Null) | None => Ok(map.remove("result").unwrap_or(Value::Null)),
                Some(error) => Err(error_message(&error)),
            };
            return Ok(Inbound::Reply(ReplyEnvelope { id, outcome }));
        }

        if let Some(kind) = map.get("type").and_then(Value::as_str) {
            return Ok(Inbound::Ignored(kind.to_string()));
        }

        Err(RelayError::validation(
            "Host message carries neither an id nor an event name",
        ))
    }
}

/// Pull a human-readable message out of a host `error` field
fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

// ============================================================================
// MCP JSON-RPC 2.0
// ============================================================================

/// JSON-RPC 2.0 Request (a notification when `id` is absent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl McpRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl McpResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(-32700, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(-32600, msg)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("Method not found: {}", method))
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(-32602, msg)
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(-32603, msg)
    }
}
