//! Tool dispatcher
//!
//! Single entry point for every `tools/call`. Catalogued arguments are
//! checked against their schema first; local tools run in-process, anything
//! else is forwarded to the host on the active channel.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::events::EventQuery;
use crate::relay::Relay;
use crate::snapshot;
use crate::tools::host::EXPORT_NODE_AS_IMAGE;
use crate::tools::local::{BatchArgs, ExportImageArgs, LocalCall, BATCH_EXECUTE};
use crate::tools::ToolCatalog;

/// One content block of a tool result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

/// MCP `tools/call` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Text of the first content block
    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(ToolContent::Text { text }) => text,
            None => "",
        }
    }
}

/// Per-entry outcome of a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchEntry {
    pub index: usize,
    pub ok: bool,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decoded `data:<mime>;base64,<payload>` URL
struct DataUrl {
    mime: String,
    bytes: Vec<u8>,
}

impl DataUrl {
    fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| RelayError::validation("Render result is not a data URL"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| RelayError::validation("Data URL has no payload"))?;
        let mime = header.strip_suffix(";base64").ok_or_else(|| {
            RelayError::validation("Data URL payload is not base64 encoded")
        })?;
        Ok(Self {
            mime: mime.to_string(),
            bytes: STANDARD.decode(payload.trim())?,
        })
    }

    /// Locate the data URL in a render result
    fn find(result: &Value) -> Option<&str> {
        if let Some(url) = result.as_str() {
            return Some(url);
        }
        ["dataUrl", "imageData", "data"]
            .iter()
            .filter_map(|key| result.get(*key).and_then(Value::as_str))
            .find(|url| url.starts_with("data:"))
    }
}

fn format_from_mime(mime: &str) -> String {
    match mime {
        "image/png" => "PNG".to_string(),
        "image/jpeg" | "image/jpg" => "JPG".to_string(),
        "image/svg+xml" => "SVG".to_string(),
        "application/pdf" => "PDF".to_string(),
        other => other.rsplit('/').next().unwrap_or(other).to_uppercase(),
    }
}

pub struct ToolDispatcher {
    relay: Arc<Relay>,
    catalog: Arc<ToolCatalog>,
}

impl ToolDispatcher {
    pub fn new(relay: Arc<Relay>, catalog: Arc<ToolCatalog>) -> Self {
        Self { relay, catalog }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Run a tool and wrap the outcome as an MCP tool result. Never fails.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult {
        match self.call(name, arguments).await {
            Ok(value) => ToolResult::success(&value),
            Err(e) => {
                warn!(tool = %name, kind = e.kind(), error = %e, "Tool call failed");
                ToolResult::error(e.to_string())
            }
        }
    }

    /// Run a tool and return its raw result
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value> {
        info!(tool = %name, "Tool call");
        let arguments = normalize(arguments);
        self.catalog.validate(name, &arguments)?;
        match LocalCall::parse(name, &arguments)? {
            Some(LocalCall::Batch(batch)) => self.run_batch(batch).await,
            Some(call) => self.run_local(call).await,
            None => self.relay.forward(name, arguments).await,
        }
    }

    /// Same as [`Self::call`] minus the batch tool
    async fn call_in_batch(&self, name: &str, arguments: Value) -> Result<Value> {
        let arguments = normalize(arguments);
        self.catalog.validate(name, &arguments)?;
        match LocalCall::parse(name, &arguments)? {
            Some(call) => self.run_local(call).await,
            None => self.relay.forward(name, arguments).await,
        }
    }

    async fn run_local(&self, call: LocalCall) -> Result<Value> {
        match call {
            LocalCall::GetEvents(args) => {
                let events = self
                    .relay
                    .query_events(&EventQuery {
                        limit: args.limit,
                        since: args.since,
                        channel: args.channel,
                        clear: args.clear,
                    })
                    .await;
                Ok(json!({ "count": events.len(), "events": events }))
            }
            LocalCall::ClearEvents(args) => {
                let cleared = self.relay.clear_events(args.channel.as_deref()).await;
                Ok(json!({ "cleared": cleared, "channel": args.channel }))
            }
            LocalCall::JoinChannel(args) => {
                let active = self.relay.join_channel(&args.channel).await?;
                Ok(json!({ "active": active }))
            }
            LocalCall::LeaveChannel(args) => {
                let report = self.relay.leave_channel(&args.channel, args.purge).await?;
                Ok(serde_json::to_value(report)?)
            }
            LocalCall::ListChannels => Ok(serde_json::to_value(self.relay.list_channels().await)?),
            LocalCall::DiffSnapshots(args) => {
                let result =
                    snapshot::diff(&args.before, &args.after, args.ignore_fields.as_deref())?;
                Ok(serde_json::to_value(result)?)
            }
            LocalCall::ExportImage(args) => self.export_image(args).await,
            LocalCall::Batch(_) => Err(RelayError::Unsupported(format!(
                "{BATCH_EXECUTE} cannot be nested"
            ))),
        }
    }

    async fn run_batch(&self, batch: BatchArgs) -> Result<Value> {
        let total = batch.operations.len();
        let mut results = Vec::with_capacity(total);

        for (index, operation) in batch.operations.into_iter().enumerate() {
            let name = operation.name;
            let outcome = match name.as_deref() {
                None | Some("") => Err(RelayError::validation(format!(
                    "Operation {index} is missing a tool name"
                ))),
                Some(BATCH_EXECUTE) => Err(RelayError::Unsupported(format!(
                    "{BATCH_EXECUTE} cannot be nested"
                ))),
                Some(tool) => self.call_in_batch(tool, operation.arguments).await,
            };

            let failed = outcome.is_err();
            results.push(match outcome {
                Ok(result) => BatchEntry {
                    index,
                    ok: true,
                    name,
                    result: Some(result),
                    error: None,
                },
                Err(e) => BatchEntry {
                    index,
                    ok: false,
                    name,
                    result: None,
                    error: Some(e.to_string()),
                },
            });

            if failed && batch.stop_on_error {
                debug!(index, "Batch stopped on error");
                break;
            }
        }

        Ok(json!({
            "total": total,
            "returned": results.len(),
            "results": results,
        }))
    }

    async fn export_image(&self, args: ExportImageArgs) -> Result<Value> {
        let path = match (&args.output_path, &args.directory, &args.filename) {
            (Some(path), _, _) => PathBuf::from(path),
            (None, Some(directory), Some(filename)) => PathBuf::from(directory).join(filename),
            _ => {
                return Err(RelayError::validation(
                    "export_image_to_file requires outputPath, or directory and filename",
                ))
            }
        };

        let rendered = self
            .relay
            .forward(EXPORT_NODE_AS_IMAGE, args.render_params())
            .await?;
        let url = DataUrl::find(&rendered).ok_or_else(|| {
            RelayError::validation("Render result does not contain a base64 data URL")
        })?;
        let image = DataUrl::parse(url)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&path, &image.bytes).await?;

        let format = rendered
            .get("format")
            .and_then(Value::as_str)
            .map(String::from)
            .or(args.format)
            .unwrap_or_else(|| format_from_mime(&image.mime));
        info!(path = %path.display(), bytes = image.bytes.len(), "Exported node image");

        Ok(json!({
            "path": path.display().to_string(),
            "bytes": image.bytes.len(),
            "format": format,
            "mimeType": image.mime,
        }))
    }
}

/// Missing arguments mean an empty object
fn normalize(arguments: Value) -> Value {
    if arguments.is_null() {
        json!({})
    } else {
        arguments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::protocol::{RelayMessage, RequestEnvelope};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn dispatcher() -> (ToolDispatcher, Arc<Relay>) {
        let relay = Relay::new(RelayConfig::default().with_request_timeout_ms(5_000)).unwrap();
        let catalog = Arc::new(ToolCatalog::new().unwrap());
        (ToolDispatcher::new(relay.clone(), catalog), relay)
    }

    /// Connect a scripted host over a socket link; returns the calls it saw
    async fn fake_host<F>(relay: &Arc<Relay>, respond: F) -> Arc<Mutex<Vec<RequestEnvelope>>>
    where
        F: Fn(&RequestEnvelope) -> Value + Send + 'static,
    {
        let (_, mut rx) = relay.connect_host().await.unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let relay = relay.clone();
        let record = seen.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let RelayMessage::Request(envelope) = message {
                    let reply = respond(&envelope);
                    record.lock().unwrap().push(envelope);
                    relay.receive(reply).await.unwrap();
                }
            }
        });
        seen
    }

    #[tokio::test]
    async fn test_forwarded_call_wraps_pretty_json() {
        let (dispatcher, relay) = dispatcher();
        let seen = fake_host(&relay, |env| json!({"id": env.id, "result": {"name": "Page 1"}})).await;
        dispatcher
            .call("join_channel", json!({"channel": "design"}))
            .await
            .unwrap();

        let result = dispatcher.call_tool("get_document_info", json!({})).await;
        assert!(!result.is_error);
        assert_eq!(
            result.text(),
            serde_json::to_string_pretty(&json!({"name": "Page 1"})).unwrap()
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].method, "get_document_info");
        assert_eq!(seen[0].channel, "design");
    }

    #[tokio::test]
    async fn test_host_error_is_flagged_verbatim() {
        let (dispatcher, relay) = dispatcher();
        fake_host(&relay, |env| json!({"id": env.id, "error": "Node not found: 9:9"})).await;

        let result = dispatcher
            .call_tool("get_node_info", json!({"nodeId": "9:9"}))
            .await;
        assert!(result.is_error);
        assert_eq!(result.text(), "Node not found: 9:9");
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_forwarded() {
        let (dispatcher, relay) = dispatcher();
        let result = dispatcher
            .call_tool("move_node", json!({"nodeId": "1:2"}))
            .await;
        assert!(result.is_error);
        assert!(result.text().starts_with("Invalid arguments for move_node"));
        assert_eq!(relay.status().await.queued_requests, 0);
    }

    #[tokio::test]
    async fn test_tool_result_wire_shape() {
        let wire = serde_json::to_value(ToolResult::error("boom")).unwrap();
        assert_eq!(
            wire,
            json!({"content": [{"type": "text", "text": "boom"}], "isError": true})
        );
    }

    #[tokio::test]
    async fn test_get_events_filters_and_clears() {
        let (dispatcher, relay) = dispatcher();
        relay
            .receive(json!({"event": "a", "timestamp": 10, "channel": "x"}))
            .await
            .unwrap();
        relay
            .receive(json!({"event": "b", "timestamp": 20, "channel": "y"}))
            .await
            .unwrap();

        let value = dispatcher
            .call("get_events", json!({"channel": "x", "clear": true}))
            .await
            .unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["events"][0]["event"], "a");
        assert_eq!(relay.status().await.buffered_events, 0);
    }

    #[tokio::test]
    async fn test_clear_events_scoped() {
        let (dispatcher, relay) = dispatcher();
        relay.receive(json!({"event": "a", "channel": "x"})).await.unwrap();
        relay.receive(json!({"event": "b", "channel": "y"})).await.unwrap();

        let value = dispatcher
            .call("clear_events", json!({"channel": "x"}))
            .await
            .unwrap();
        assert_eq!(value["cleared"], 1);
        assert_eq!(relay.status().await.buffered_events, 1);
    }

    #[tokio::test]
    async fn test_channel_tools() {
        let (dispatcher, _relay) = dispatcher();
        dispatcher
            .call("join_channel", json!({"channel": "review"}))
            .await
            .unwrap();
        let listing = dispatcher.call("list_channels", json!({})).await.unwrap();
        assert_eq!(listing["active"], "review");

        let left = dispatcher
            .call("leave_channel", json!({"channel": "review"}))
            .await
            .unwrap();
        assert_eq!(left["active"], "default");
        assert_eq!(left["removed"], true);
    }

    #[tokio::test]
    async fn test_diff_snapshots_tool() {
        let (dispatcher, _relay) = dispatcher();
        let value = dispatcher
            .call(
                "diff_snapshots",
                json!({
                    "before": [{"id": "1", "x": 10}],
                    "after": {"nodes": [{"id": "1", "x": 20}]}
                }),
            )
            .await
            .unwrap();
        assert_eq!(value["changedCount"], 1);
        assert_eq!(value["changed"][0]["fields"]["x"], json!({"before": 10, "after": 20}));
    }

    fn ok_fail_ok() -> Value {
        json!([
            {"name": "join_channel", "arguments": {"channel": "a"}},
            {"name": "join_channel", "arguments": {"channel": ""}},
            {"name": "list_channels"}
        ])
    }

    #[tokio::test]
    async fn test_batch_stop_on_error() {
        let (dispatcher, _relay) = dispatcher();
        let value = dispatcher
            .call(
                "batch_execute",
                json!({"operations": ok_fail_ok(), "stopOnError": true}),
            )
            .await
            .unwrap();
        assert_eq!(value["total"], 3);
        assert_eq!(value["returned"], 2);
        assert_eq!(value["results"][0]["ok"], true);
        assert_eq!(value["results"][1]["ok"], false);
        assert_eq!(value["results"][1]["index"], 1);
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let (dispatcher, _relay) = dispatcher();
        let value = dispatcher
            .call("batch_execute", json!({"operations": ok_fail_ok()}))
            .await
            .unwrap();
        assert_eq!(value["returned"], 3);
        assert_eq!(value["results"][2]["ok"], true);
        assert_eq!(value["results"][2]["result"]["active"], "a");
    }

    #[tokio::test]
    async fn test_batch_rejects_nested_and_unnamed() {
        let (dispatcher, _relay) = dispatcher();
        let value = dispatcher
            .call(
                "batch_execute",
                json!({"operations": [
                    {"name": "batch_execute", "arguments": {"operations": []}},
                    {"arguments": {}}
                ]}),
            )
            .await
            .unwrap();
        assert_eq!(value["returned"], 2);
        assert!(value["results"][0]["error"]
            .as_str()
            .unwrap()
            .starts_with("Unsupported operation"));
        assert!(value["results"][1]["error"]
            .as_str()
            .unwrap()
            .contains("missing a tool name"));
    }

    #[tokio::test]
    async fn test_export_writes_decoded_image() {
        let (dispatcher, relay) = dispatcher();
        let seen = fake_host(&relay, |env| {
            json!({"id": env.id, "result": {"dataUrl": "data:image/png;base64,iVBORw0KGgo="}})
        })
        .await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("frame.png");

        let value = dispatcher
            .call(
                "export_image_to_file",
                json!({"nodeId": "1:2", "outputPath": path.to_str().unwrap()}),
            )
            .await
            .unwrap();

        assert_eq!(value["bytes"], 8);
        assert_eq!(value["mimeType"], "image/png");
        assert_eq!(value["format"], "PNG");
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"\x89PNG\r\n\x1a\n".to_vec()
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].method, EXPORT_NODE_AS_IMAGE);
        assert_eq!(seen[0].params, json!({"nodeId": "1:2"}));
    }

    #[tokio::test]
    async fn test_export_directory_and_filename() {
        let (dispatcher, relay) = dispatcher();
        fake_host(&relay, |env| {
            json!({"id": env.id, "result": "data:image/svg+xml;base64,PHN2Zy8+"})
        })
        .await;
        let dir = TempDir::new().unwrap();

        let value = dispatcher
            .call(
                "export_image_to_file",
                json!({
                    "nodeId": "1:2",
                    "directory": dir.path().to_str().unwrap(),
                    "filename": "icon.svg"
                }),
            )
            .await
            .unwrap();
        assert_eq!(value["format"], "SVG");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("icon.svg")).unwrap(),
            "<svg/>"
        );
    }

    #[tokio::test]
    async fn test_export_without_data_url_writes_nothing() {
        let (dispatcher, relay) = dispatcher();
        fake_host(&relay, |env| json!({"id": env.id, "result": {"url": "https://x"}})).await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.png");

        let err = dispatcher
            .call(
                "export_image_to_file",
                json!({"nodeId": "1:2", "outputPath": path.to_str().unwrap()}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_export_requires_path_before_forwarding() {
        let (dispatcher, relay) = dispatcher();
        let err = dispatcher
            .call("export_image_to_file", json!({"nodeId": "1:2", "directory": "/tmp"}))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        assert_eq!(relay.status().await.queued_requests, 0);
    }

    #[test]
    fn test_data_url_parse_rejects_non_base64() {
        assert!(DataUrl::parse("data:text/plain,hello").is_err());
        assert!(DataUrl::parse("image/png;base64,AAAA").is_err());
        assert!(matches!(
            DataUrl::parse("data:image/png;base64,@@@"),
            Err(RelayError::Validation(_))
        ));
    }
}
