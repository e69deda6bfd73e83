//! Live-update fan-out to connected subscribers.
//!
//! Subscribers are transport-agnostic: anything that can accept a text frame
//! implements [`Subscriber`]. A failed delivery disconnects that subscriber
//! and never reaches the caller of [`Broadcaster::broadcast`].

use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// A live connection that accepts text messages.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Stable identity of the connection.
    fn id(&self) -> &str;

    async fn send(&self, message: &str) -> Result<()>;
}

/// Subscriber backed by a bounded tokio channel.
///
/// A full or closed channel is a delivery failure, so a consumer that stops
/// reading is dropped rather than buffered without bound.
pub struct ChannelSubscriber {
    id: String,
    tx: mpsc::Sender<String>,
}

impl ChannelSubscriber {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = format!("chan-{}", uuid::Uuid::new_v4());
        (Self { id, tx }, rx)
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, message: &str) -> Result<()> {
        self.tx.try_send(message.to_string()).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "channel full",
                mpsc::error::TrySendError::Closed(_) => "channel closed",
            };
            Error::runtime_with_context(
                format!("delivery to {} failed", self.id),
                ErrorContext::new()
                    .with_details(reason)
                    .with_source("broadcast"),
            )
        })
    }
}

/// Outcome of one [`Broadcaster::broadcast`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Subscribers whose send failed; each is disconnected.
    pub dropped: usize,
}

#[derive(Default)]
pub struct Broadcaster {
    subscribers: RwLock<HashMap<String, Arc<dyn Subscriber>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns `false` if one with the same id is already connected.
    pub async fn connect(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        let id = subscriber.id().to_string();
        let mut subs = self.subscribers.write().await;
        if subs.contains_key(&id) {
            return false;
        }
        subs.insert(id.clone(), subscriber);
        debug!(subscriber = %id, total = subs.len(), "subscriber connected");
        true
    }

    /// Remove a subscriber. Absent ids are ignored.
    pub async fn disconnect(&self, id: &str) -> bool {
        let removed = self.subscribers.write().await.remove(id).is_some();
        if removed {
            debug!(subscriber = %id, "subscriber disconnected");
        }
        removed
    }

    /// Connect a fresh [`ChannelSubscriber`] and hand back its id and receiving end.
    pub async fn subscribe_channel(&self, buffer: usize) -> (String, mpsc::Receiver<String>) {
        let (sub, rx) = ChannelSubscriber::new(buffer);
        let id = sub.id.clone();
        self.connect(Arc::new(sub)).await;
        (id, rx)
    }

    /// Deliver `message` to every subscriber connected when the call began.
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        let snapshot: Vec<Arc<dyn Subscriber>> =
            self.subscribers.read().await.values().cloned().collect();
        if snapshot.is_empty() {
            return BroadcastReport::default();
        }

        let results = futures::future::join_all(snapshot.iter().map(|s| s.send(message))).await;

        let failed: Vec<(&Arc<dyn Subscriber>, Error)> = snapshot
            .iter()
            .zip(results)
            .filter_map(|(s, r)| r.err().map(|e| (s, e)))
            .collect();

        if !failed.is_empty() {
            let mut subs = self.subscribers.write().await;
            for (sub, err) in &failed {
                let id = sub.id();
                // the id may have been reconnected by another connection meanwhile
                if subs.get(id).is_some_and(|current| Arc::ptr_eq(current, *sub)) {
                    subs.remove(id);
                    warn!(subscriber = %id, error = %err, "send failed; subscriber removed");
                } else {
                    debug!(subscriber = %id, error = %err, "send failed on a replaced subscriber");
                }
            }
        }

        BroadcastReport {
            delivered: snapshot.len() - failed.len(),
            dropped: failed.len(),
        }
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }
}

/// JSON envelope pushed to dashboards: `{"type": kind, "data": data}`.
pub fn event_message(kind: &str, data: serde_json::Value) -> String {
    serde_json::json!({ "type": kind, "data": data }).to_string()
}
