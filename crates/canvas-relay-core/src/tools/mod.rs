//! Tool catalog
//!
//! Every tool the agent can call is declared here with a strict JSON input
//! schema. Local tools are executed in-process by the dispatcher; host tools
//! are forwarded verbatim to the plugin.

pub mod host;
pub mod local;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{RelayError, Result};

/// Where a tool runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Local,
    Host,
}

/// Declaration of one tool
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub kind: ToolKind,
}

/// Tool information for MCP `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Object schema that rejects unknown properties
pub(crate) fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

/// All declared tools plus their compiled validators
pub struct ToolCatalog {
    tools: Vec<ToolSpec>,
    validators: HashMap<&'static str, jsonschema::Validator>,
}

impl ToolCatalog {
    /// Build the catalog and compile every input schema
    pub fn new() -> Result<Self> {
        let mut tools = local::tools();
        tools.extend(host::tools());

        let mut validators = HashMap::with_capacity(tools.len());
        for tool in &tools {
            let validator = jsonschema::validator_for(&tool.input_schema).map_err(|e| {
                RelayError::Config(format!("Invalid input schema for {}: {e}", tool.name))
            })?;
            if validators.insert(tool.name, validator).is_some() {
                return Err(RelayError::Config(format!(
                    "Tool declared twice: {}",
                    tool.name
                )));
            }
        }

        Ok(Self { tools, validators })
    }

    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name.to_string(),
                description: t.description.to_string(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check `arguments` against the tool's schema. Names outside the
    /// catalog are not checked; they are forwarded as-is.
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<()> {
        let Some(validator) = self.validators.get(name) else {
            return Ok(());
        };
        let problems: Vec<String> = validator
            .iter_errors(arguments)
            .map(|e| e.to_string())
            .collect();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(RelayError::validation(format!(
                "Invalid arguments for {name}: {}",
                problems.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_builds_and_lists_both_kinds() {
        let catalog = ToolCatalog::new().unwrap();
        assert!(catalog.len() > 20);
        assert_eq!(catalog.get("get_events").unwrap().kind, ToolKind::Local);
        assert_eq!(catalog.get("get_node_info").unwrap().kind, ToolKind::Host);

        let listed = catalog.list();
        let wire = serde_json::to_value(&listed[0]).unwrap();
        assert!(wire.get("inputSchema").is_some());
    }

    #[test]
    fn test_every_schema_is_strict() {
        let catalog = ToolCatalog::new().unwrap();
        for tool in catalog.list() {
            assert_eq!(
                tool.input_schema["additionalProperties"],
                Value::Bool(false),
                "{} accepts unknown properties",
                tool.name
            );
        }
    }

    #[test]
    fn test_validate_required_and_extra_properties() {
        let catalog = ToolCatalog::new().unwrap();
        assert!(catalog
            .validate("get_node_info", &json!({"nodeId": "1:2"}))
            .is_ok());
        assert!(catalog.validate("get_node_info", &json!({})).is_err());
        assert!(catalog
            .validate("get_node_info", &json!({"nodeId": "1:2", "extra": true}))
            .is_err());
    }

    #[test]
    fn test_validate_enum_and_minimum() {
        let catalog = ToolCatalog::new().unwrap();
        assert!(catalog
            .validate("export_node_as_image", &json!({"nodeId": "1", "format": "GIF"}))
            .is_err());
        assert!(catalog
            .validate("get_events", &json!({"limit": 0}))
            .is_err());
        assert!(catalog.validate("get_events", &json!({"limit": 5})).is_ok());
    }

    #[test]
    fn test_unknown_tool_is_not_validated() {
        let catalog = ToolCatalog::new().unwrap();
        assert!(catalog.validate("custom_host_method", &json!({"x": 1})).is_ok());
    }

    #[test]
    fn test_validation_message_names_tool() {
        let catalog = ToolCatalog::new().unwrap();
        let err = catalog.validate("join_channel", &json!({})).unwrap_err();
        assert!(err.to_string().starts_with("Invalid arguments for join_channel"));
    }
}
