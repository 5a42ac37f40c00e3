use axum::extract::ws::{Message, WebSocket};
use bson::oid::ObjectId;
use dashmap::DashMap;
use futures::stream::SplitSink;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Tracks all active WebSocket connections by user ID.
/// Each user can have multiple connections (multiple tabs/devices).
pub struct WsStorage<S = WsSender> {
    connections: DashMap<ObjectId, Vec<(String, S)>>,
    owners: DashMap<String, ObjectId>,
}

impl<S: Clone> WsStorage<S> {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            owners: DashMap::new(),
        }
    }

    /// Registers a connection. Returns true when it is the user's first.
    pub fn add(&self, user_id: ObjectId, connection_id: String, sender: S) -> bool {
        self.owners.insert(connection_id.clone(), user_id);
        let mut entry = self.connections.entry(user_id).or_default();
        let first = entry.is_empty();
        entry.push((connection_id, sender));
        first
    }

    /// Drops a connection. Returns true when the user has none left.
    pub fn remove(&self, user_id: &ObjectId, connection_id: &str) -> bool {
        self.owners.remove(connection_id);
        if let Some(mut senders) = self.connections.get_mut(user_id) {
            senders.retain(|(id, _)| id != connection_id);
            if !senders.is_empty() {
                return false;
            }
        }
        self.connections.remove_if(user_id, |_, v| v.is_empty());
        !self.connections.contains_key(user_id)
    }

    pub fn get_senders(&self, user_id: &ObjectId) -> Vec<S> {
        self.connections
            .get(user_id)
            .map(|s| s.iter().map(|(_, sender)| sender.clone()).collect())
            .unwrap_or_default()
    }

    pub fn get_connection(&self, connection_id: &str) -> Option<S> {
        let user_id = *self.owners.get(connection_id)?;
        self.connections.get(&user_id).and_then(|senders| {
            senders
                .iter()
                .find(|(id, _)| id == connection_id)
                .map(|(_, sender)| sender.clone())
        })
    }

    pub fn is_online(&self, user_id: &ObjectId) -> bool {
        self.connections.contains_key(user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections
            .iter()
            .map(|r| r.value().len())
            .sum()
    }
}

impl<S: Clone> Default for WsStorage<S> {
    fn default() -> Self {
        Self::new()
    }
}
