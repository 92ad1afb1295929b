//! Node snapshots and flat structural diffing
//!
//! A snapshot is a list of JSON node projections, each carrying a stable
//! string `id`. Diffing matches nodes by id and compares their top-level
//! fields; nested structure is compared as a whole value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{RelayError, Result};
use crate::ids;

/// Field ignored when the caller does not say otherwise
pub const DEFAULT_IGNORED_FIELDS: &[&str] = &["children"];

/// Point-in-time projection of host nodes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub timestamp: i64,
    pub nodes: Vec<Value>,
}

impl Snapshot {
    /// Accept either a bare node array or an object with a `nodes` array
    pub fn from_value(value: &Value, side: &str) -> Result<Self> {
        let (timestamp, nodes) = match value {
            Value::Array(nodes) => (ids::now_millis(), nodes),
            Value::Object(obj) => match obj.get("nodes") {
                Some(Value::Array(nodes)) => (
                    obj.get("timestamp")
                        .and_then(Value::as_i64)
                        .unwrap_or_else(ids::now_millis),
                    nodes,
                ),
                _ => {
                    return Err(RelayError::validation(format!(
                        "'{side}' must be an array of nodes or an object with a 'nodes' array"
                    )))
                }
            },
            _ => {
                return Err(RelayError::validation(format!(
                    "'{side}' must be an array of nodes or an object with a 'nodes' array"
                )))
            }
        };
        Ok(Self {
            timestamp,
            nodes: nodes.clone(),
        })
    }
}

/// Before/after pair for one changed field; absent sides are omitted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeChange {
    pub id: String,
    pub fields: BTreeMap<String, FieldChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub added_count: usize,
    pub removed_count: usize,
    pub changed_count: usize,
    pub added: Vec<Value>,
    pub removed: Vec<Value>,
    pub changed: Vec<NodeChange>,
}

/// Nodes keyed by id, in first-seen order; a repeated id keeps the later node
struct IndexedNodes<'a> {
    order: Vec<&'a str>,
    by_id: HashMap<&'a str, &'a Map<String, Value>>,
}

impl<'a> IndexedNodes<'a> {
    fn build(nodes: &'a [Value], side: &str) -> Result<Self> {
        let mut order = Vec::new();
        let mut by_id = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            let obj = node.as_object().ok_or_else(|| {
                RelayError::validation(format!("{side}[{index}] is not an object"))
            })?;
            let id = obj.get("id").and_then(Value::as_str).ok_or_else(|| {
                RelayError::validation(format!("{side}[{index}] is missing a string 'id'"))
            })?;
            if by_id.insert(id, obj).is_none() {
                order.push(id);
            }
        }
        Ok(Self { order, by_id })
    }

    fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    fn node(&self, id: &str) -> Value {
        Value::Object(self.by_id[id].clone())
    }
}

/// Canonical serialized form used for equality. serde_json maps keep keys
/// sorted, so key order in the producer does not matter.
fn canonical(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn diff_fields(
    before: &Map<String, Value>,
    after: &Map<String, Value>,
    ignored: &BTreeSet<&str>,
) -> BTreeMap<String, FieldChange> {
    let names: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    let mut fields = BTreeMap::new();
    for name in names {
        if ignored.contains(name.as_str()) {
            continue;
        }
        let b = before.get(name);
        let a = after.get(name);
        let same = match (b, a) {
            (Some(b), Some(a)) => canonical(b) == canonical(a),
            (None, None) => true,
            _ => false,
        };
        if !same {
            fields.insert(
                name.clone(),
                FieldChange {
                    before: b.cloned(),
                    after: a.cloned(),
                },
            );
        }
    }
    fields
}

/// Compare two snapshots (arrays or `{nodes: [...]}` wrappers).
///
/// `ignore_fields` replaces the default ignore set when given.
pub fn diff(before: &Value, after: &Value, ignore_fields: Option<&[String]>) -> Result<DiffResult> {
    let before = Snapshot::from_value(before, "before")?;
    let after = Snapshot::from_value(after, "after")?;
    let old = IndexedNodes::build(&before.nodes, "before")?;
    let new = IndexedNodes::build(&after.nodes, "after")?;

    let ignored: BTreeSet<&str> = match ignore_fields {
        Some(fields) => fields.iter().map(String::as_str).collect(),
        None => DEFAULT_IGNORED_FIELDS.iter().copied().collect(),
    };

    let added: Vec<Value> = new
        .order
        .iter()
        .filter(|id| !old.contains(id))
        .map(|id| new.node(id))
        .collect();

    let removed: Vec<Value> = old
        .order
        .iter()
        .filter(|id| !new.contains(id))
        .map(|id| old.node(id))
        .collect();

    let changed: Vec<NodeChange> = old
        .order
        .iter()
        .filter(|id| new.contains(id))
        .filter_map(|id| {
            let fields = diff_fields(old.by_id[id], new.by_id[id], &ignored);
            (!fields.is_empty()).then(|| NodeChange {
                id: id.to_string(),
                fields,
            })
        })
        .collect();

    Ok(DiffResult {
        added_count: added.len(),
        removed_count: removed.len(),
        changed_count: changed.len(),
        added,
        removed,
        changed,
    })
}
