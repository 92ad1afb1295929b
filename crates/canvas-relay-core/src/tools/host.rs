//! Host tools: forwarded verbatim, declared here for discovery and argument checks

use serde_json::{json, Value};

use super::{object_schema, ToolKind, ToolSpec};

/// Render method used by the file export tool
pub const EXPORT_NODE_AS_IMAGE: &str = "export_node_as_image";

fn node_id() -> Value {
    json!({"type": "string", "minLength": 1, "description": "Node id"})
}

fn coordinate() -> Value {
    json!({"type": "number"})
}

fn dimension() -> Value {
    json!({"type": "number", "exclusiveMinimum": 0})
}

fn channel_value() -> Value {
    json!({"type": "number", "minimum": 0, "maximum": 1})
}

fn color() -> Value {
    object_schema(
        json!({
            "r": channel_value(),
            "g": channel_value(),
            "b": channel_value(),
            "a": channel_value()
        }),
        &["r", "g", "b"],
    )
}

fn host(name: &'static str, description: &'static str, input_schema: Value) -> ToolSpec {
    ToolSpec {
        name,
        description,
        input_schema,
        kind: ToolKind::Host,
    }
}

pub(super) fn tools() -> Vec<ToolSpec> {
    vec![
        host(
            "get_document_info",
            "Get the current document and page",
            object_schema(json!({}), &[]),
        ),
        host(
            "get_selection",
            "Get the nodes currently selected",
            object_schema(json!({}), &[]),
        ),
        host(
            "get_node_info",
            "Get details for one node",
            object_schema(json!({"nodeId": node_id()}), &["nodeId"]),
        ),
        host(
            "get_nodes_info",
            "Get details for several nodes",
            object_schema(
                json!({"nodeIds": {"type": "array", "items": node_id(), "minItems": 1}}),
                &["nodeIds"],
            ),
        ),
        host(
            "get_snapshot",
            "Capture a snapshot ({timestamp, nodes}) suitable for diff_snapshots",
            object_schema(
                json!({
                    "nodeIds": {"type": "array", "items": node_id()},
                    "depth": {"type": "integer", "minimum": 0}
                }),
                &[],
            ),
        ),
        host(
            "create_rectangle",
            "Create a rectangle",
            object_schema(
                json!({
                    "x": coordinate(),
                    "y": coordinate(),
                    "width": dimension(),
                    "height": dimension(),
                    "name": {"type": "string"},
                    "parentId": node_id()
                }),
                &["x", "y", "width", "height"],
            ),
        ),
        host(
            "create_frame",
            "Create a frame",
            object_schema(
                json!({
                    "x": coordinate(),
                    "y": coordinate(),
                    "width": dimension(),
                    "height": dimension(),
                    "name": {"type": "string"},
                    "parentId": node_id(),
                    "fillColor": color()
                }),
                &["x", "y", "width", "height"],
            ),
        ),
        host(
            "create_text",
            "Create a text node",
            object_schema(
                json!({
                    "x": coordinate(),
                    "y": coordinate(),
                    "text": {"type": "string"},
                    "fontSize": {"type": "number", "minimum": 1},
                    "fontWeight": {"type": "integer", "minimum": 100, "maximum": 900},
                    "fontColor": color(),
                    "name": {"type": "string"},
                    "parentId": node_id()
                }),
                &["x", "y", "text"],
            ),
        ),
        host(
            "set_fill_color",
            "Set the fill color of a node (RGBA components in 0..1)",
            object_schema(
                json!({
                    "nodeId": node_id(),
                    "r": channel_value(),
                    "g": channel_value(),
                    "b": channel_value(),
                    "a": channel_value()
                }),
                &["nodeId", "r", "g", "b"],
            ),
        ),
        host(
            "set_stroke_color",
            "Set the stroke color and weight of a node",
            object_schema(
                json!({
                    "nodeId": node_id(),
                    "r": channel_value(),
                    "g": channel_value(),
                    "b": channel_value(),
                    "a": channel_value(),
                    "weight": {"type": "number", "minimum": 0}
                }),
                &["nodeId", "r", "g", "b"],
            ),
        ),
        host(
            "set_corner_radius",
            "Set the corner radius of a node",
            object_schema(
                json!({
                    "nodeId": node_id(),
                    "radius": {"type": "number", "minimum": 0},
                    "corners": {
                        "type": "array",
                        "items": {"type": "boolean"},
                        "minItems": 4,
                        "maxItems": 4,
                        "description": "Top-left, top-right, bottom-right, bottom-left"
                    }
                }),
                &["nodeId", "radius"],
            ),
        ),
        host(
            "move_node",
            "Move a node",
            object_schema(
                json!({"nodeId": node_id(), "x": coordinate(), "y": coordinate()}),
                &["nodeId", "x", "y"],
            ),
        ),
        host(
            "resize_node",
            "Resize a node",
            object_schema(
                json!({"nodeId": node_id(), "width": dimension(), "height": dimension()}),
                &["nodeId", "width", "height"],
            ),
        ),
        host(
            "set_layout_mode",
            "Set the auto layout mode of a frame",
            object_schema(
                json!({
                    "nodeId": node_id(),
                    "layoutMode": {"type": "string", "enum": ["NONE", "HORIZONTAL", "VERTICAL"]},
                    "layoutWrap": {"type": "string", "enum": ["NO_WRAP", "WRAP"]}
                }),
                &["nodeId", "layoutMode"],
            ),
        ),
        host(
            "delete_node",
            "Delete a node",
            object_schema(json!({"nodeId": node_id()}), &["nodeId"]),
        ),
        host(
            "clone_node",
            "Duplicate a node, optionally at a new position",
            object_schema(
                json!({"nodeId": node_id(), "x": coordinate(), "y": coordinate()}),
                &["nodeId"],
            ),
        ),
        host(
            "set_text_content",
            "Replace the characters of a text node",
            object_schema(
                json!({"nodeId": node_id(), "text": {"type": "string"}}),
                &["nodeId", "text"],
            ),
        ),
        host(
            "set_multiple_text_contents",
            "Replace the characters of several text nodes under a parent",
            object_schema(
                json!({
                    "nodeId": node_id(),
                    "text": {
                        "type": "array",
                        "minItems": 1,
                        "items": object_schema(
                            json!({"nodeId": node_id(), "text": {"type": "string"}}),
                            &["nodeId", "text"],
                        )
                    }
                }),
                &["nodeId", "text"],
            ),
        ),
        host(
            "scan_text_nodes",
            "List every text node under a node",
            object_schema(json!({"nodeId": node_id()}), &["nodeId"]),
        ),
        host(
            "get_styles",
            "List local paint, text and effect styles",
            object_schema(json!({}), &[]),
        ),
        host(
            "get_local_components",
            "List components defined in the document",
            object_schema(json!({}), &[]),
        ),
        host(
            "create_component_instance",
            "Place an instance of a component",
            object_schema(
                json!({
                    "componentKey": {"type": "string", "minLength": 1},
                    "x": coordinate(),
                    "y": coordinate()
                }),
                &["componentKey", "x", "y"],
            ),
        ),
        host(
            EXPORT_NODE_AS_IMAGE,
            "Render a node and return it as a base64 data URL",
            object_schema(
                json!({
                    "nodeId": node_id(),
                    "format": {"type": "string", "enum": ["PNG", "JPG", "SVG", "PDF"]},
                    "scale": {"type": "number", "exclusiveMinimum": 0}
                }),
                &["nodeId"],
            ),
        ),
    ]
}
