//! Tools executed inside the relay, with their typed arguments

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{object_schema, ToolKind, ToolSpec};
use crate::error::{RelayError, Result};

pub const GET_EVENTS: &str = "get_events";
pub const CLEAR_EVENTS: &str = "clear_events";
pub const JOIN_CHANNEL: &str = "join_channel";
pub const LEAVE_CHANNEL: &str = "leave_channel";
pub const LIST_CHANNELS: &str = "list_channels";
pub const DIFF_SNAPSHOTS: &str = "diff_snapshots";
pub const EXPORT_IMAGE_TO_FILE: &str = "export_image_to_file";
pub const BATCH_EXECUTE: &str = "batch_execute";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GetEventsArgs {
    pub limit: Option<usize>,
    pub since: Option<i64>,
    pub channel: Option<String>,
    #[serde(default)]
    pub clear: bool,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClearEventsArgs {
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JoinChannelArgs {
    pub channel: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LeaveChannelArgs {
    pub channel: String,
    #[serde(default)]
    pub purge: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DiffSnapshotsArgs {
    pub before: Value,
    pub after: Value,
    pub ignore_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ExportImageArgs {
    pub node_id: String,
    pub format: Option<String>,
    pub scale: Option<f64>,
    pub output_path: Option<String>,
    pub directory: Option<String>,
    pub filename: Option<String>,
}

impl ExportImageArgs {
    /// Arguments for the render call: everything except the path fields
    pub fn render_params(&self) -> Value {
        let mut params = json!({ "nodeId": self.node_id });
        if let Some(format) = &self.format {
            params["format"] = json!(format);
        }
        if let Some(scale) = self.scale {
            params["scale"] = json!(scale);
        }
        params
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BatchOperation {
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BatchArgs {
    pub operations: Vec<BatchOperation>,
    #[serde(default)]
    pub stop_on_error: bool,
}

/// A parsed call to one of the local tools
#[derive(Debug, Clone, PartialEq)]
pub enum LocalCall {
    GetEvents(GetEventsArgs),
    ClearEvents(ClearEventsArgs),
    JoinChannel(JoinChannelArgs),
    LeaveChannel(LeaveChannelArgs),
    ListChannels,
    DiffSnapshots(DiffSnapshotsArgs),
    ExportImage(ExportImageArgs),
    Batch(BatchArgs),
}

fn parse_args<T: DeserializeOwned>(name: &str, arguments: &Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    };
    serde_json::from_value(arguments)
        .map_err(|e| RelayError::validation(format!("Invalid arguments for {name}: {e}")))
}

impl LocalCall {
    /// Parse a local tool call; `None` when `name` is not a local tool
    pub fn parse(name: &str, arguments: &Value) -> Result<Option<Self>> {
        let call = match name {
            GET_EVENTS => LocalCall::GetEvents(parse_args(name, arguments)?),
            CLEAR_EVENTS => LocalCall::ClearEvents(parse_args(name, arguments)?),
            JOIN_CHANNEL => LocalCall::JoinChannel(parse_args(name, arguments)?),
            LEAVE_CHANNEL => LocalCall::LeaveChannel(parse_args(name, arguments)?),
            LIST_CHANNELS => LocalCall::ListChannels,
            DIFF_SNAPSHOTS => LocalCall::DiffSnapshots(parse_args(name, arguments)?),
            EXPORT_IMAGE_TO_FILE => LocalCall::ExportImage(parse_args(name, arguments)?),
            BATCH_EXECUTE => LocalCall::Batch(parse_args(name, arguments)?),
            _ => return Ok(None),
        };
        Ok(Some(call))
    }
}

fn channel_property() -> Value {
    json!({"type": "string", "minLength": 1, "description": "Channel label"})
}

pub(super) fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: GET_EVENTS,
            description: "Read buffered host events, optionally filtered by channel and timestamp. \
                          With clear=true the whole buffer is emptied after reading.",
            input_schema: object_schema(
                json!({
                    "limit": {"type": "integer", "minimum": 1, "description": "Return at most the last N matches"},
                    "since": {"type": "integer", "minimum": 0, "description": "Only events at or after this timestamp (ms)"},
                    "channel": channel_property(),
                    "clear": {"type": "boolean", "default": false}
                }),
                &[],
            ),
            kind: ToolKind::Local,
        },
        ToolSpec {
            name: CLEAR_EVENTS,
            description: "Remove buffered events for one channel, or all events when no channel is given",
            input_schema: object_schema(json!({"channel": channel_property()}), &[]),
            kind: ToolKind::Local,
        },
        ToolSpec {
            name: JOIN_CHANNEL,
            description: "Join a channel and make it active. Forwarded calls and untagged events use the active channel.",
            input_schema: object_schema(json!({"channel": channel_property()}), &["channel"]),
            kind: ToolKind::Local,
        },
        ToolSpec {
            name: LEAVE_CHANNEL,
            description: "Leave a channel, optionally purging its buffered events. The default channel is never removed.",
            input_schema: object_schema(
                json!({
                    "channel": channel_property(),
                    "purge": {"type": "boolean", "default": false}
                }),
                &["channel"],
            ),
            kind: ToolKind::Local,
        },
        ToolSpec {
            name: LIST_CHANNELS,
            description: "List known channels, the active channel and buffered event counts per channel",
            input_schema: object_schema(json!({}), &[]),
            kind: ToolKind::Local,
        },
        ToolSpec {
            name: DIFF_SNAPSHOTS,
            description: "Compare two node snapshots by id and report added, removed and changed nodes",
            input_schema: object_schema(
                json!({
                    "before": {"type": ["array", "object"], "description": "Node array or {nodes: [...]}"},
                    "after": {"type": ["array", "object"], "description": "Node array or {nodes: [...]}"},
                    "ignoreFields": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Fields to skip (defaults to [\"children\"])"
                    }
                }),
                &["before", "after"],
            ),
            kind: ToolKind::Local,
        },
        ToolSpec {
            name: EXPORT_IMAGE_TO_FILE,
            description: "Render a node as an image on the host and write it to disk. \
                          Requires outputPath, or directory and filename.",
            input_schema: object_schema(
                json!({
                    "nodeId": {"type": "string", "minLength": 1},
                    "format": {"type": "string", "enum": ["PNG", "JPG", "SVG", "PDF"]},
                    "scale": {"type": "number", "exclusiveMinimum": 0},
                    "outputPath": {"type": "string", "minLength": 1},
                    "directory": {"type": "string", "minLength": 1},
                    "filename": {"type": "string", "minLength": 1}
                }),
                &["nodeId"],
            ),
            kind: ToolKind::Local,
        },
        ToolSpec {
            name: BATCH_EXECUTE,
            description: "Run several tool calls in order and collect per-call results",
            input_schema: object_schema(
                json!({
                    "operations": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "arguments": {"type": "object"}
                            },
                            "additionalProperties": false
                        }
                    },
                    "stopOnError": {"type": "boolean", "default": false}
                }),
                &["operations"],
            ),
            kind: ToolKind::Local,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_non_local_is_none() {
        assert_eq!(LocalCall::parse("get_selection", &json!({})).unwrap(), None);
    }

    #[test]
    fn test_parse_null_arguments_as_empty() {
        let call = LocalCall::parse(GET_EVENTS, &Value::Null).unwrap().unwrap();
        assert_eq!(call, LocalCall::GetEvents(GetEventsArgs::default()));
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let err = LocalCall::parse(JOIN_CHANNEL, &json!({"channel": "a", "x": 1})).unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }

    #[test]
    fn test_parse_batch_defaults() {
        let call = LocalCall::parse(
            BATCH_EXECUTE,
            &json!({"operations": [{"name": "get_selection"}]}),
        )
        .unwrap()
        .unwrap();
        let LocalCall::Batch(args) = call else {
            panic!("expected batch");
        };
        assert!(!args.stop_on_error);
        assert_eq!(args.operations[0].name.as_deref(), Some("get_selection"));
        assert_eq!(args.operations[0].arguments, Value::Null);
    }

    #[test]
    fn test_render_params_drop_path_fields() {
        let args: ExportImageArgs = serde_json::from_value(json!({
            "nodeId": "1:2",
            "format": "PNG",
            "outputPath": "/tmp/x.png"
        }))
        .unwrap();
        assert_eq!(args.render_params(), json!({"nodeId": "1:2", "format": "PNG"}));
    }
}
