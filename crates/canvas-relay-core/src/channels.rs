//! Channel registry
//!
//! Channels are labels that partition host events between concurrent agent
//! sessions. The registry knows a set of labels plus exactly one active
//! label; the reserved default label is always known.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{RelayError, Result};

struct ChannelState {
    active: String,
    known: BTreeSet<String>,
}

/// Result of [`ChannelRegistry::leave`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub channel: String,
    /// Whether the label was dropped from the known set
    pub removed: bool,
    /// Active label after the call
    pub active: String,
}

/// Known channels and the active one
pub struct ChannelRegistry {
    default_label: String,
    state: RwLock<ChannelState>,
}

fn validate_label(label: &str) -> Result<&str> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(RelayError::validation("Channel name must be a non-empty string"));
    }
    Ok(trimmed)
}

impl ChannelRegistry {
    pub fn new(default_label: impl Into<String>) -> Self {
        let default_label = default_label.into();
        let mut known = BTreeSet::new();
        known.insert(default_label.clone());
        Self {
            state: RwLock::new(ChannelState {
                active: default_label.clone(),
                known,
            }),
            default_label,
        }
    }

    pub fn default_label(&self) -> &str {
        &self.default_label
    }

    /// Add `label` (idempotent) and make it active. Returns the active label.
    pub async fn join(&self, label: &str) -> Result<String> {
        let label = validate_label(label)?;
        let mut state = self.state.write().await;
        state.known.insert(label.to_string());
        state.active = label.to_string();
        info!(channel = %label, "Joined channel");
        Ok(state.active.clone())
    }

    /// Forget `label` unless it is the reserved default. If it was active,
    /// the default label becomes active again.
    pub async fn leave(&self, label: &str) -> Result<LeaveOutcome> {
        let label = validate_label(label)?;
        let mut state = self.state.write().await;

        let removed = label != self.default_label && state.known.remove(label);
        if label != self.default_label && state.active == label {
            state.active = self.default_label.clone();
        }
        info!(channel = %label, removed, active = %state.active, "Left channel");

        Ok(LeaveOutcome {
            channel: label.to_string(),
            removed,
            active: state.active.clone(),
        })
    }

    pub async fn active(&self) -> String {
        self.state.read().await.active.clone()
    }

    /// Known labels, sorted
    pub async fn known(&self) -> Vec<String> {
        self.state.read().await.known.iter().cloned().collect()
    }
}
