//! Prompt catalog served through `prompts/list` and `prompts/get`

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{RelayError, Result};

/// A static prompt
#[derive(Debug, Clone)]
pub struct Prompt {
    pub name: &'static str,
    pub description: &'static str,
    pub text: &'static str,
}

/// Prompt entry for `prompts/list`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptInfo {
    pub name: String,
    pub description: String,
    pub arguments: Vec<Value>,
}

const PROMPTS: &[Prompt] = &[
    Prompt {
        name: "design_strategy",
        description: "Best practices for building designs through the relay",
        text: "When creating designs:\n\
               1. Start with get_document_info and get_selection to understand the current state.\n\
               2. Build top-down: create a parent frame first, then pass its id as parentId.\n\
               3. Use set_layout_mode on container frames instead of positioning every child by hand.\n\
               4. Name every node you create so later calls can find it.\n\
               5. Group related edits in batch_execute to cut round trips, and set stopOnError \
                  when later steps depend on earlier ones.\n\
               6. Verify the result with get_node_info or a snapshot diff before moving on.",
    },
    Prompt {
        name: "read_design_strategy",
        description: "How to inspect an existing design efficiently",
        text: "When reading designs:\n\
               1. Start with get_selection; fall back to get_document_info when nothing is selected.\n\
               2. Prefer get_nodes_info for several ids over repeated get_node_info calls.\n\
               3. Take a get_snapshot before and after a change, then call diff_snapshots to see \
                  exactly which fields moved.\n\
               4. Use get_events to catch up on selection and document changes made by the user.",
    },
    Prompt {
        name: "text_replacement_strategy",
        description: "Replacing text across many nodes safely",
        text: "When replacing text:\n\
               1. Run scan_text_nodes on the target container to collect every text node id.\n\
               2. Plan replacements in chunks, keeping each node's role (heading, label, body) intact.\n\
               3. Apply each chunk with set_multiple_text_contents.\n\
               4. After each chunk, export_image_to_file the container and check the layout \
                  still holds before continuing.",
    },
    Prompt {
        name: "channel_workflow",
        description: "Working with channels when several sessions share one host",
        text: "Channels keep sessions apart:\n\
               1. Call join_channel with a label unique to your task before doing anything else.\n\
               2. Forwarded calls carry the active channel; untagged host events are filed under it.\n\
               3. Read your events with get_events and channel set to your label.\n\
               4. Note that get_events with clear=true empties the buffer for every channel; use \
                  clear_events with a channel to drop only your own events.\n\
               5. When finished, leave_channel with purge=true.",
    },
];

pub fn list() -> Vec<PromptInfo> {
    PROMPTS
        .iter()
        .map(|p| PromptInfo {
            name: p.name.to_string(),
            description: p.description.to_string(),
            arguments: Vec::new(),
        })
        .collect()
}

pub fn find(name: &str) -> Option<&'static Prompt> {
    PROMPTS.iter().find(|p| p.name == name)
}

/// Body of a `prompts/get` result
pub fn get(name: &str) -> Result<Value> {
    let prompt =
        find(name).ok_or_else(|| RelayError::validation(format!("Unknown prompt: {name}")))?;
    Ok(json!({
        "description": prompt.description,
        "messages": [{
            "role": "user",
            "content": {"type": "text", "text": prompt.text}
        }]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_names() {
        let names: Vec<String> = list().into_iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec![
                "design_strategy",
                "read_design_strategy",
                "text_replacement_strategy",
                "channel_workflow"
            ]
        );
    }

    #[test]
    fn test_get_returns_single_user_message() {
        let body = get("channel_workflow").unwrap();
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body["messages"][0]["content"]["text"]
            .as_str()
            .unwrap()
            .contains("join_channel"));
    }

    #[test]
    fn test_unknown_prompt() {
        assert!(matches!(get("nope"), Err(RelayError::Validation(_))));
    }
}
