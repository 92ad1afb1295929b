//! Request/response correlation
//!
//! Every forwarded call registers a pending entry keyed by its correlation
//! id. The entry is settled exactly once: by a reply, by its timeout timer,
//! or by a connection loss. Settling removes the entry under the table lock,
//! so whichever path gets there first wins and the others find nothing.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{RelayError, Result};

type ReplySender = oneshot::Sender<Result<Value>>;

/// A call waiting for its reply
struct PendingRequest {
    created_at: Instant,
    /// Connection the envelope was pushed over, `None` when queued for polling
    route: Option<String>,
    reply_tx: ReplySender,
    timer: JoinHandle<()>,
}

impl PendingRequest {
    fn settle(self, outcome: Result<Value>) {
        self.timer.abort();
        // Receiver may be gone if the caller stopped waiting
        let _ = self.reply_tx.send(outcome);
    }
}

/// Handle returned by [`CorrelationTable::register`]
#[derive(Debug)]
pub struct PendingReply {
    id: String,
    reply_rx: oneshot::Receiver<Result<Value>>,
}

impl PendingReply {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait until the entry is settled
    pub async fn wait(self) -> Result<Value> {
        match self.reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RelayError::disconnected(
                "Reply channel closed before the host answered",
            )),
        }
    }
}

/// Table of in-flight forwarded calls
#[derive(Clone, Default)]
pub struct CorrelationTable {
    pending: Arc<Mutex<HashMap<String, PendingRequest>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending call and start its timeout timer.
    ///
    /// Ids must be unique while pending; a duplicate is rejected.
    pub async fn register(
        &self,
        id: &str,
        timeout: Duration,
        route: Option<String>,
    ) -> Result<PendingReply> {
        let mut pending = self.pending.lock().await;
        if pending.contains_key(id) {
            return Err(RelayError::validation(format!(
                "Correlation id already pending: {id}"
            )));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let timer = self.spawn_timer(id.to_string(), timeout);

        pending.insert(
            id.to_string(),
            PendingRequest {
                created_at: Instant::now(),
                route,
                reply_tx,
                timer,
            },
        );

        Ok(PendingReply {
            id: id.to_string(),
            reply_rx,
        })
    }

    fn spawn_timer(&self, id: String, timeout: Duration) -> JoinHandle<()> {
        let table = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let entry = table.lock().await.remove(&id);
            if let Some(entry) = entry {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(id = %id, timeout_ms, "Forwarded call timed out");
                // The entry is already out of the table; sending directly
                // avoids aborting the task we are running in.
                let _ = entry.reply_tx.send(Err(RelayError::Timeout(timeout_ms)));
            }
        })
    }

    /// Record the connection an envelope was pushed over
    pub async fn set_route(&self, id: &str, route: Option<String>) {
        if let Some(entry) = self.pending.lock().await.get_mut(id) {
            entry.route = route;
        }
    }

    /// Settle a pending call successfully. Returns `false` for unknown ids.
    pub async fn resolve(&self, id: &str, result: Value) -> bool {
        self.settle(id, Ok(result)).await
    }

    /// Settle a pending call with an error. Returns `false` for unknown ids.
    pub async fn reject(&self, id: &str, error: RelayError) -> bool {
        self.settle(id, Err(error)).await
    }

    async fn settle(&self, id: &str, outcome: Result<Value>) -> bool {
        let entry = self.pending.lock().await.remove(id);
        match entry {
            Some(entry) => {
                debug!(
                    id = %id,
                    elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
                    ok = outcome.is_ok(),
                    "Settled forwarded call"
                );
                entry.settle(outcome);
                true
            }
            None => {
                debug!(id = %id, "Reply for unknown or already settled call dropped");
                false
            }
        }
    }

    /// Reject every pending call. Used when the active connection is lost.
    pub async fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut pending = self.pending.lock().await;
            pending.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            entry.settle(Err(RelayError::disconnected(reason)));
        }
        count
    }

    /// Reject the calls that were pushed over one specific connection
    pub async fn fail_routed(&self, connection_id: &str, reason: &str) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut pending = self.pending.lock().await;
            let ids: Vec<String> = pending
                .iter()
                .filter(|(_, entry)| entry.route.as_deref() == Some(connection_id))
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| pending.remove(id)).collect()
        };
        let count = drained.len();
        for entry in drained {
            entry.settle(Err(RelayError::disconnected(reason)));
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.pending.lock().await.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LONG: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_resolve_settles_once() {
        let table = CorrelationTable::new();
        let reply = table.register("a", LONG, None).await.unwrap();

        assert!(table.resolve("a", json!({"ok": true})).await);
        assert!(!table.resolve("a", json!({"ok": false})).await);
        assert!(!table.reject("a", RelayError::host("late")).await);

        assert_eq!(reply.wait().await.unwrap(), json!({"ok": true}));
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_reject_carries_host_message() {
        let table = CorrelationTable::new();
        let reply = table.register("b", LONG, None).await.unwrap();
        table.reject("b", RelayError::host("Node not found")).await;
        assert_eq!(
            reply.wait().await.unwrap_err(),
            RelayError::host("Node not found")
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let table = CorrelationTable::new();
        let _first = table.register("dup", LONG, None).await.unwrap();
        assert!(table.register("dup", LONG, None).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry() {
        let table = CorrelationTable::new();
        let reply = table
            .register("slow", Duration::from_millis(150), None)
            .await
            .unwrap();

        let err = reply.wait().await.unwrap_err();
        assert_eq!(err, RelayError::Timeout(150));
        assert!(!table.contains("slow").await);

        // Late reply is silently dropped
        assert!(!table.resolve("slow", json!(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_does_not_leak() {
        let table = CorrelationTable::new();
        drop(table.register("gone", Duration::from_millis(10), None).await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_fail_all_rejects_every_pending_call() {
        let table = CorrelationTable::new();
        let mut replies = Vec::new();
        for i in 0..5 {
            replies.push(table.register(&format!("r{i}"), LONG, None).await.unwrap());
        }

        assert_eq!(table.fail_all("Host plugin disconnected").await, 5);
        assert!(table.is_empty().await);

        for reply in replies {
            assert_eq!(
                reply.wait().await.unwrap_err(),
                RelayError::disconnected("Host plugin disconnected")
            );
        }
    }

    #[tokio::test]
    async fn test_fail_routed_only_touches_that_connection() {
        let table = CorrelationTable::new();
        let old = table
            .register("old", LONG, Some("conn-1".into()))
            .await
            .unwrap();
        let _new = table
            .register("new", LONG, Some("conn-2".into()))
            .await
            .unwrap();
        let _queued = table.register("queued", LONG, None).await.unwrap();

        assert_eq!(table.fail_routed("conn-1", "closed").await, 1);
        assert!(old.wait().await.is_err());
        assert_eq!(table.len().await, 2);
        assert!(table.contains("new").await);
        assert!(table.contains("queued").await);
    }
}
