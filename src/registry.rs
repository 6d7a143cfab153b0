//! Live connection registry used for real-time pushes.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Event delivered over a user's live channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushEvent {
    pub event: String,
    pub payload: Value,
}

/// Tracks which users are connected and how to reach them.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    /// user_id -> live connections (a user may have several tabs open)
    channels: RwLock<HashMap<i64, Vec<(Uuid, mpsc::UnboundedSender<PushEvent>)>>>,
    /// user_id -> last time a connection for the user went away
    last_seen: RwLock<HashMap<i64, DateTime<Utc>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns (conn_id, receiver).
    pub async fn connect(&self, user_id: i64) -> (Uuid, mpsc::UnboundedReceiver<PushEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .channels
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push((conn_id, tx));
        debug!(user_id, %conn_id, "connection registered");
        (conn_id, rx)
    }

    /// Drop a connection. Other connections of the same user stay registered.
    pub async fn disconnect(&self, user_id: i64, conn_id: Uuid) {
        let mut channels = self.inner.channels.write().await;
        if let Some(conns) = channels.get_mut(&user_id) {
            conns.retain(|(id, _)| *id != conn_id);
            if conns.is_empty() {
                channels.remove(&user_id);
            }
        }
        drop(channels);
        self.inner
            .last_seen
            .write()
            .await
            .insert(user_id, Utc::now());
        debug!(user_id, %conn_id, "connection removed");
    }

    /// Push an event to every live connection of `user_id`. Returns whether at
    /// least one connection accepted it. Closed receivers are pruned.
    pub async fn emit(&self, user_id: i64, event: &str, payload: Value) -> bool {
        let mut channels = self.inner.channels.write().await;
        let Some(conns) = channels.get_mut(&user_id) else {
            return false;
        };
        let ev = PushEvent {
            event: event.to_string(),
            payload,
        };
        conns.retain(|(_, tx)| tx.send(ev.clone()).is_ok());
        let delivered = !conns.is_empty();
        if !delivered {
            channels.remove(&user_id);
        }
        delivered
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.inner
            .channels
            .read()
            .await
            .get(&user_id)
            .is_some_and(|c| !c.is_empty())
    }

    pub async fn online_users(&self) -> Vec<i64> {
        let mut users: Vec<i64> = self.inner.channels.read().await.keys().copied().collect();
        users.sort_unstable();
        users
    }

    pub async fn last_seen(&self, user_id: i64) -> Option<DateTime<Utc>> {
        self.inner.last_seen.read().await.get(&user_id).copied()
    }
}
