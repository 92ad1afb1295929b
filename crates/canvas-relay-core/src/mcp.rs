//! MCP server
//!
//! Handles decoded JSON-RPC requests for any transport (stdio session or
//! `POST /mcp`). Notifications produce no response.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::dispatcher::ToolDispatcher;
use crate::error::Result;
use crate::prompts;
use crate::protocol::{JsonRpcError, McpRequest, McpResponse};
use crate::relay::Relay;
use crate::tools::ToolCatalog;
use crate::RELAY_VERSION;

/// MCP protocol revision advertised in `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const INSTRUCTIONS: &str = "Relays tool calls to a design-tool plugin. \
    Call join_channel first when several sessions share the same host.";

pub struct McpServer {
    relay: Arc<Relay>,
    dispatcher: ToolDispatcher,
}

impl McpServer {
    pub fn new(relay: Arc<Relay>) -> Result<Self> {
        let catalog = Arc::new(ToolCatalog::new()?);
        Ok(Self {
            dispatcher: ToolDispatcher::new(relay.clone(), catalog),
            relay,
        })
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Handle one raw JSON-RPC message
    pub async fn handle_message(&self, message: Value) -> Option<McpResponse> {
        match serde_json::from_value::<McpRequest>(message) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(McpResponse::error(
                None,
                JsonRpcError::invalid_request(e.to_string()),
            )),
        }
    }

    /// Handle one line of a newline-delimited stream
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        match serde_json::from_str::<Value>(line) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => Some(McpResponse::error(
                None,
                JsonRpcError::parse_error(e.to_string()),
            )),
        }
    }

    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        debug!(method = %request.method, id = ?request.id, "MCP request");

        if request.jsonrpc != "2.0" {
            return Some(McpResponse::error(
                request.id,
                JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
            ));
        }

        if request.is_notification() {
            if request.method == "notifications/initialized" {
                info!("MCP client initialized");
            } else {
                debug!(method = %request.method, "Ignoring notification");
            }
            return None;
        }

        let id = request.id.clone();
        let params = request.params.unwrap_or(Value::Null);
        let response = match request.method.as_str() {
            "initialize" => McpResponse::success(id, self.initialize_result()),
            "ping" => McpResponse::success(id, json!({})),
            "tools/list" => McpResponse::success(
                id,
                json!({ "tools": self.dispatcher.catalog().list() }),
            ),
            "tools/call" => self.handle_tools_call(id, params).await,
            "prompts/list" => McpResponse::success(id, json!({ "prompts": prompts::list() })),
            "prompts/get" => match params.get("name").and_then(Value::as_str) {
                Some(name) => match prompts::get(name) {
                    Ok(body) => McpResponse::success(id, body),
                    Err(e) => McpResponse::error(id, JsonRpcError::invalid_params(e.to_string())),
                },
                None => McpResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing prompt name"),
                ),
            },
            other => McpResponse::error(id, JsonRpcError::method_not_found(other)),
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": self.relay.config().server_name,
                "version": RELAY_VERSION
            },
            "capabilities": {
                "tools": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "instructions": INSTRUCTIONS
        })
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> McpResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return McpResponse::error(id, JsonRpcError::invalid_params("Missing tool name"));
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let result = self.dispatcher.call_tool(name, arguments).await;
        match serde_json::to_value(&result) {
            Ok(value) => McpResponse::success(id, value),
            Err(e) => McpResponse::error(id, JsonRpcError::internal_error(e.to_string())),
        }
    }
}
