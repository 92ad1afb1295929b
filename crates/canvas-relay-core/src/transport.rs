//! Host transports
//!
//! The relay reaches the host plugin either by pushing frames down an open
//! socket or by queueing envelopes until the plugin polls for them. Both sit
//! behind [`HostLink`] so the delivery code never branches on transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::{mpsc, Mutex};

use crate::error::{RelayError, Result};
use crate::protocol::{RelayMessage, RequestEnvelope};

/// How an envelope reaches the host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// Pushed immediately over an open duplex socket
    Socket,
    /// Held in the FIFO queue until the host polls
    Polling,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportType::Socket => write!(f, "socket"),
            TransportType::Polling => write!(f, "polling"),
        }
    }
}

/// Something that can carry a forwarded call to the host
#[async_trait]
pub trait HostLink: Send + Sync {
    fn transport_type(&self) -> TransportType;

    /// Connection id when the link is a socket
    fn connection_id(&self) -> Option<&str>;

    fn is_open(&self) -> bool;

    async fn deliver(&self, envelope: RequestEnvelope) -> Result<()>;
}

/// Push side of a host socket.
///
/// The server owns the actual socket; this end only feeds its writer task.
pub struct SocketLink {
    connection_id: String,
    tx: mpsc::UnboundedSender<RelayMessage>,
}

impl SocketLink {
    /// Create a link and the receiver the socket writer task drains
    pub fn new(connection_id: String) -> (Self, mpsc::UnboundedReceiver<RelayMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { connection_id, tx }, rx)
    }

    pub fn id(&self) -> &str {
        &self.connection_id
    }

    /// Send a non-request frame (handshake)
    pub fn announce(&self, message: RelayMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| RelayError::disconnected("Host socket is closed"))
    }
}

#[async_trait]
impl HostLink for SocketLink {
    fn transport_type(&self) -> TransportType {
        TransportType::Socket
    }

    fn connection_id(&self) -> Option<&str> {
        Some(&self.connection_id)
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn deliver(&self, envelope: RequestEnvelope) -> Result<()> {
        self.tx
            .send(RelayMessage::Request(envelope))
            .map_err(|_| RelayError::disconnected("Host socket is closed"))
    }
}

/// FIFO of envelopes waiting for the host to poll
#[derive(Default)]
pub struct PollQueue {
    queue: Mutex<VecDeque<RequestEnvelope>>,
}

impl PollQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dequeue the oldest envelope
    pub async fn take(&self) -> Option<RequestEnvelope> {
        self.queue.lock().await.pop_front()
    }

    /// Drop a queued envelope by id. Returns `false` when it was already taken.
    pub async fn remove(&self, id: &str) -> bool {
        let mut queue = self.queue.lock().await;
        match queue.iter().position(|env| env.id == id) {
            Some(index) => queue.remove(index).is_some(),
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}

#[async_trait]
impl HostLink for PollQueue {
    fn transport_type(&self) -> TransportType {
        TransportType::Polling
    }

    fn connection_id(&self) -> Option<&str> {
        None
    }

    fn is_open(&self) -> bool {
        true
    }

    async fn deliver(&self, envelope: RequestEnvelope) -> Result<()> {
        self.queue.lock().await.push_back(envelope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(id: &str) -> RequestEnvelope {
        RequestEnvelope::new(id.into(), "ping".into(), json!({}), "default".into())
    }

    #[test]
    fn test_transport_type_display() {
        assert_eq!(TransportType::Socket.to_string(), "socket");
        assert_eq!(TransportType::Polling.to_string(), "polling");
    }

    #[tokio::test]
    async fn test_poll_queue_is_fifo() {
        let queue = PollQueue::new();
        queue.deliver(envelope("1")).await.unwrap();
        queue.deliver(envelope("2")).await.unwrap();

        assert_eq!(queue.take().await.unwrap().id, "1");
        assert_eq!(queue.take().await.unwrap().id, "2");
        assert!(queue.take().await.is_none());
    }

    #[tokio::test]
    async fn test_poll_queue_remove_by_id() {
        let queue = PollQueue::new();
        queue.deliver(envelope("1")).await.unwrap();
        queue.deliver(envelope("2")).await.unwrap();

        assert!(queue.remove("1").await);
        assert!(!queue.remove("1").await);
        assert_eq!(queue.take().await.unwrap().id, "2");
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_socket_link_delivers_to_writer() {
        let (link, mut rx) = SocketLink::new("conn".into());
        assert!(link.is_open());
        link.deliver(envelope("x")).await.unwrap();

        match rx.recv().await.unwrap() {
            RelayMessage::Request(env) => assert_eq!(env.id, "x"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_socket_link_closed_when_writer_gone() {
        let (link, rx) = SocketLink::new("conn".into());
        drop(rx);
        assert!(!link.is_open());
        assert!(matches!(
            link.deliver(envelope("x")).await,
            Err(RelayError::Disconnected(_))
        ));
    }
}
