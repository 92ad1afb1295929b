//! Host event buffer
//!
//! Bounded, channel-tagged ring buffer of notifications pushed by the host
//! plugin. Oldest entries are evicted first; agents read them on demand.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

use crate::ids;
use crate::protocol::EventEnvelope;

/// A buffered host notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub event: String,
    pub payload: Value,
    /// Milliseconds since UNIX_EPOCH
    pub timestamp: i64,
    pub channel: String,
}

impl Event {
    pub fn new(event: impl Into<String>, payload: Value, timestamp: i64, channel: impl Into<String>) -> Self {
        Self {
            id: ids::event_id(),
            event: event.into(),
            payload,
            timestamp,
            channel: channel.into(),
        }
    }

    /// Build from a host envelope; missing fields fall back to receipt time
    /// and the given channel.
    pub fn from_envelope(envelope: EventEnvelope, fallback_channel: &str) -> Self {
        Self::new(
            envelope.event,
            envelope.payload,
            envelope.timestamp.unwrap_or_else(ids::now_millis),
            envelope
                .channel
                .unwrap_or_else(|| fallback_channel.to_string()),
        )
    }
}

/// Filter for [`EventBuffer::query`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventQuery {
    /// Return at most this many of the newest matches
    pub limit: Option<usize>,
    /// Only events with `timestamp >= since`
    pub since: Option<i64>,
    /// Only events tagged with this channel
    pub channel: Option<String>,
    /// Empty the whole buffer after reading
    pub clear: bool,
}

impl EventQuery {
    fn matches(&self, event: &Event) -> bool {
        if let Some(channel) = &self.channel {
            if &event.channel != channel {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// Bounded event ring buffer
pub struct EventBuffer {
    capacity: usize,
    entries: RwLock<VecDeque<Event>>,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append at the tail, evicting from the head while over capacity
    pub async fn append(&self, event: Event) {
        let mut entries = self.entries.write().await;
        debug!(event = %event.event, channel = %event.channel, "Buffered host event");
        entries.push_back(event);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Read matching events in chronological order.
    ///
    /// With `clear` set, the entire buffer is emptied afterwards, regardless
    /// of the channel or timestamp filter.
    pub async fn query(&self, query: &EventQuery) -> Vec<Event> {
        let mut entries = self.entries.write().await;

        let matching: Vec<&Event> = entries.iter().filter(|e| query.matches(e)).collect();
        let skip = match query.limit {
            Some(limit) => matching.len().saturating_sub(limit),
            None => 0,
        };
        let result: Vec<Event> = matching.into_iter().skip(skip).cloned().collect();

        if query.clear {
            entries.clear();
        }
        result
    }

    /// Remove all events, or only those tagged with `channel`.
    /// Returns how many were removed.
    pub async fn clear(&self, channel: Option<&str>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        match channel {
            Some(channel) => entries.retain(|e| e.channel != channel),
            None => entries.clear(),
        }
        before - entries.len()
    }

    /// Per-channel tally of the live buffer contents
    pub async fn channel_counts(&self) -> BTreeMap<String, usize> {
        let entries = self.entries.read().await;
        let mut counts = BTreeMap::new();
        for event in entries.iter() {
            *counts.entry(event.channel.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
