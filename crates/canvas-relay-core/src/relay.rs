//! Relay context
//!
//! One [`Relay`] owns every piece of mutable state: channel registry, event
//! buffer and delivery channel. Servers and MCP sessions share it through an
//! `Arc`; tests can create as many independent relays as they like.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::channels::ChannelRegistry;
use crate::config::RelayConfig;
use crate::delivery::{Delivery, InboundKind};
use crate::error::Result;
use crate::events::{Event, EventBuffer, EventQuery};
use crate::ids;
use crate::protocol::RelayMessage;
use crate::transport::SocketLink;
use crate::RELAY_VERSION;

/// Result of [`Relay::leave_channel`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaveReport {
    pub channel: String,
    pub removed: bool,
    pub active: String,
    /// Events dropped from the buffer (0 unless purging)
    pub purged: usize,
}

/// Channels known to the relay, with live per-channel event counts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelListing {
    pub active: String,
    pub channels: Vec<String>,
    pub counts: BTreeMap<String, usize>,
}

/// Health snapshot served by `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub status: String,
    pub server: String,
    pub version: String,
    pub host_connected: bool,
    pub connection_id: Option<String>,
    pub pending_requests: usize,
    pub queued_requests: usize,
    pub buffered_events: usize,
    pub active_channel: String,
}

pub struct Relay {
    config: RelayConfig,
    channels: ChannelRegistry,
    events: Arc<EventBuffer>,
    delivery: Delivery,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let events = Arc::new(EventBuffer::new(config.event_capacity));
        Ok(Arc::new(Self {
            channels: ChannelRegistry::new(config.default_channel.clone()),
            delivery: Delivery::new(events.clone(), config.request_timeout()),
            events,
            config,
        }))
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Forward a call to the host on the active channel
    pub async fn forward(&self, method: &str, params: Value) -> Result<Value> {
        let channel = self.channels.active().await;
        self.delivery.send(method, params, &channel).await
    }

    /// Route a message from the host. Untagged events land on the active channel.
    pub async fn receive(&self, message: Value) -> Result<InboundKind> {
        let channel = self.channels.active().await;
        self.delivery.receive(message, &channel).await
    }

    /// Register a new host socket and make it active.
    ///
    /// Returns its connection id and the frame receiver the socket writer
    /// drains. The `ready` handshake is already queued on it.
    pub async fn connect_host(&self) -> Result<(String, mpsc::UnboundedReceiver<RelayMessage>)> {
        let connection_id = ids::connection_id();
        let (link, rx) = SocketLink::new(connection_id.clone());
        link.announce(RelayMessage::Ready {
            server: self.config.server_name.clone(),
            version: RELAY_VERSION.to_string(),
            connection_id: connection_id.clone(),
        })?;
        self.delivery.attach(Arc::new(link)).await;
        Ok((connection_id, rx))
    }

    /// Forget a host socket; returns how many pending calls were failed
    pub async fn disconnect_host(&self, connection_id: &str) -> usize {
        self.delivery.detach(connection_id).await
    }

    /// Next queued call for a polling host, or `idle`
    pub async fn poll(&self) -> RelayMessage {
        match self.delivery.poll().await {
            Some(envelope) => RelayMessage::Request(envelope),
            None => RelayMessage::Idle,
        }
    }

    pub async fn query_events(&self, query: &EventQuery) -> Vec<Event> {
        self.events.query(query).await
    }

    pub async fn clear_events(&self, channel: Option<&str>) -> usize {
        self.events.clear(channel).await
    }

    pub async fn join_channel(&self, label: &str) -> Result<String> {
        self.channels.join(label).await
    }

    /// Leave a channel. Purging applies to the default label too, even
    /// though the label itself stays known.
    pub async fn leave_channel(&self, label: &str, purge: bool) -> Result<LeaveReport> {
        let outcome = self.channels.leave(label).await?;
        let purged = if purge {
            self.events.clear(Some(&outcome.channel)).await
        } else {
            0
        };
        if purged > 0 {
            info!(channel = %outcome.channel, purged, "Purged channel events");
        }
        Ok(LeaveReport {
            channel: outcome.channel,
            removed: outcome.removed,
            active: outcome.active,
            purged,
        })
    }

    pub async fn list_channels(&self) -> ChannelListing {
        ChannelListing {
            active: self.channels.active().await,
            channels: self.channels.known().await,
            counts: self.events.channel_counts().await,
        }
    }

    pub async fn active_channel(&self) -> String {
        self.channels.active().await
    }

    pub async fn status(&self) -> RelayStatus {
        let connection_id = self.delivery.active_connection().await;
        RelayStatus {
            status: "ok".to_string(),
            server: self.config.server_name.clone(),
            version: RELAY_VERSION.to_string(),
            host_connected: connection_id.is_some(),
            connection_id,
            pending_requests: self.delivery.pending_count().await,
            queued_requests: self.delivery.queued_count().await,
            buffered_events: self.events.len().await,
            active_channel: self.channels.active().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use serde_json::json;

    fn relay() -> Arc<Relay> {
        Relay::new(RelayConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RelayConfig::default().with_event_capacity(0);
        assert!(matches!(Relay::new(config), Err(RelayError::Config(_))));
    }

    #[tokio::test]
    async fn test_connect_host_sends_ready_first() {
        let relay = relay();
        let (connection_id, mut rx) = relay.connect_host().await.unwrap();

        match rx.recv().await.unwrap() {
            RelayMessage::Ready {
                server,
                connection_id: announced,
                ..
            } => {
                assert_eq!(server, "canvas-relay");
                assert_eq!(announced, connection_id);
            }
            other => panic!("expected ready, got {other:?}"),
        }

        let status = relay.status().await;
        assert!(status.host_connected);
        assert_eq!(status.connection_id.as_deref(), Some(connection_id.as_str()));
    }

    #[tokio::test]
    async fn test_poll_idle_when_nothing_queued() {
        assert_eq!(relay().poll().await, RelayMessage::Idle);
    }

    #[tokio::test]
    async fn test_forward_uses_active_channel() {
        let relay = relay();
        relay.join_channel("design").await.unwrap();

        let caller = {
            let relay = relay.clone();
            tokio::spawn(async move { relay.forward("get_selection", json!({})).await })
        };
        let envelope = loop {
            if let RelayMessage::Request(env) = relay.poll().await {
                break env;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(envelope.channel, "design");

        relay
            .receive(json!({"id": envelope.id, "result": []}))
            .await
            .unwrap();
        assert_eq!(caller.await.unwrap().unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_join_then_list_shows_known_and_active() {
        let relay = relay();
        relay.join_channel("design").await.unwrap();
        relay
            .receive(json!({"event": "selection_changed", "payload": {"ids": ["1"]}}))
            .await
            .unwrap();

        let listing = relay.list_channels().await;
        assert_eq!(listing.active, "design");
        assert_eq!(listing.channels, vec!["default", "design"]);
        assert_eq!(listing.counts.get("design"), Some(&1));
    }

    #[tokio::test]
    async fn test_leave_with_purge_clears_events() {
        let relay = relay();
        relay.join_channel("design").await.unwrap();
        relay
            .receive(json!({"event": "document_changed"}))
            .await
            .unwrap();
        relay
            .receive(json!({"event": "page_changed", "channel": "default"}))
            .await
            .unwrap();

        let report = relay.leave_channel("design", true).await.unwrap();
        assert!(report.removed);
        assert_eq!(report.purged, 1);
        assert_eq!(report.active, "default");
        assert_eq!(relay.status().await.buffered_events, 1);
    }

    #[tokio::test]
    async fn test_leave_default_with_purge_keeps_label() {
        let relay = relay();
        relay
            .receive(json!({"event": "page_changed"}))
            .await
            .unwrap();

        let report = relay.leave_channel("default", true).await.unwrap();
        assert!(!report.removed);
        assert_eq!(report.purged, 1);
        assert!(relay
            .list_channels()
            .await
            .channels
            .contains(&"default".to_string()));
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_calls() {
        let relay = relay();
        let (connection_id, _rx) = relay.connect_host().await.unwrap();

        let caller = {
            let relay = relay.clone();
            tokio::spawn(async move { relay.forward("get_styles", json!({})).await })
        };
        while relay.status().await.pending_requests == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(relay.disconnect_host(&connection_id).await, 1);
        assert!(matches!(
            caller.await.unwrap(),
            Err(RelayError::Disconnected(_))
        ));
        assert!(!relay.status().await.host_connected);
    }
}
