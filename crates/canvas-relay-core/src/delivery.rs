//! Delivery channel
//!
//! Sends forwarded calls to the host over whichever link is usable right
//! now, and routes everything the host sends back: replies go to the
//! correlation table, events go to the event buffer.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::correlation::CorrelationTable;
use crate::error::{RelayError, Result};
use crate::events::{Event, EventBuffer};
use crate::ids;
use crate::protocol::{Inbound, RequestEnvelope};
use crate::transport::{HostLink, PollQueue, SocketLink};

/// Message used when the host connection carrying a call goes away
pub const DISCONNECTED_REASON: &str = "Host plugin disconnected";

/// What an inbound message turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    Reply,
    Event,
    Ignored,
}

impl InboundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboundKind::Reply => "reply",
            InboundKind::Event => "event",
            InboundKind::Ignored => "ignored",
        }
    }
}

pub struct Delivery {
    correlation: CorrelationTable,
    active: RwLock<Option<Arc<SocketLink>>>,
    queue: Arc<PollQueue>,
    events: Arc<EventBuffer>,
    request_timeout: Duration,
}

impl Delivery {
    pub fn new(events: Arc<EventBuffer>, request_timeout: Duration) -> Self {
        Self {
            correlation: CorrelationTable::new(),
            active: RwLock::new(None),
            queue: Arc::new(PollQueue::new()),
            events,
            request_timeout,
        }
    }

    /// Pick the link for the next envelope: the active socket when open,
    /// the poll queue otherwise.
    fn route(&self, active: &Option<Arc<SocketLink>>) -> Arc<dyn HostLink> {
        match active {
            Some(link) if link.is_open() => link.clone(),
            _ => self.queue.clone(),
        }
    }

    /// Forward a call and wait for its reply, error or timeout
    pub async fn send(&self, method: &str, params: Value, channel: &str) -> Result<Value> {
        let id = ids::correlation_id();
        let envelope = RequestEnvelope::new(id.clone(), method.to_string(), params, channel.to_string());

        let reply = {
            // Held until the envelope is handed off, so a concurrent detach
            // either sees this entry or runs before the route is chosen.
            let active = self.active.read().await;
            let link = self.route(&active);
            let route = link.connection_id().map(String::from);

            let reply = self
                .correlation
                .register(&id, self.request_timeout, route)
                .await?;

            debug!(id = %id, method = %method, transport = %link.transport_type(), "Forwarding call");
            if let Err(e) = link.deliver(envelope.clone()).await {
                warn!(id = %id, error = %e, "Socket delivery failed, queueing for polling");
                self.correlation.set_route(&id, None).await;
                if let Err(e) = self.queue.deliver(envelope).await {
                    self.correlation.reject(&id, e).await;
                }
            }
            reply
        };

        let outcome = reply.wait().await;
        if outcome.is_err() && self.queue.remove(&id).await {
            debug!(id = %id, "Withdrew queued envelope for failed call");
        }
        outcome
    }

    /// Make `link` the active socket. A previously active socket is left
    /// open but no longer receives new calls.
    pub async fn attach(&self, link: Arc<SocketLink>) {
        let mut active = self.active.write().await;
        if let Some(previous) = active.as_ref() {
            info!(previous = %previous.id(), next = %link.id(), "Replacing active host connection");
        } else {
            info!(connection = %link.id(), "Host connected");
        }
        *active = Some(link);
    }

    /// Handle the close of a host socket. Returns how many pending calls
    /// were failed.
    pub async fn detach(&self, connection_id: &str) -> usize {
        let was_active = {
            let mut active = self.active.write().await;
            if active.as_ref().map(|l| l.id() == connection_id).unwrap_or(false) {
                *active = None;
                true
            } else {
                false
            }
        };

        let failed = if was_active {
            self.correlation.fail_all(DISCONNECTED_REASON).await
        } else {
            self.correlation
                .fail_routed(connection_id, DISCONNECTED_REASON)
                .await
        };
        info!(connection = %connection_id, was_active, failed, "Host connection closed");
        failed
    }

    /// Route a message from the host (socket frame or push body)
    pub async fn receive(&self, message: Value, fallback_channel: &str) -> Result<InboundKind> {
        match Inbound::classify(message)? {
            Inbound::Reply(reply) => {
                let settled = match reply.outcome {
                    Ok(result) => self.correlation.resolve(&reply.id, result).await,
                    Err(message) => {
                        self.correlation
                            .reject(&reply.id, RelayError::Host(message))
                            .await
                    }
                };
                if !settled {
                    debug!(id = %reply.id, "Dropped reply with no pending call");
                }
                Ok(InboundKind::Reply)
            }
            Inbound::Event(envelope) => {
                self.events
                    .append(Event::from_envelope(envelope, fallback_channel))
                    .await;
                Ok(InboundKind::Event)
            }
            Inbound::Ignored(kind) => {
                debug!(kind = %kind, "Ignoring host message");
                Ok(InboundKind::Ignored)
            }
        }
    }

    /// Oldest queued envelope whose call is still pending, for polling hosts
    pub async fn poll(&self) -> Option<RequestEnvelope> {
        while let Some(envelope) = self.queue.take().await {
            if self.correlation.contains(&envelope.id).await {
                return Some(envelope);
            }
            debug!(id = %envelope.id, "Skipped queued envelope for settled call");
        }
        None
    }

    pub async fn active_connection(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .filter(|l| l.is_open())
            .map(|l| l.id().to_string())
    }

    pub async fn pending_count(&self) -> usize {
        self.correlation.len().await
    }

    pub async fn queued_count(&self) -> usize {
        self.queue.len().await
    }
}
