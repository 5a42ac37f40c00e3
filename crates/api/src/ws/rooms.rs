use bson::oid::ObjectId;
use dashmap::DashMap;
use std::collections::HashSet;

/// Chat rooms keyed by match id. Membership is per connection, so a user with
/// two tabs open can sit in a room from one and not the other.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<ObjectId, HashSet<String>>,
    joined: DashMap<String, HashSet<ObjectId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the connection was already in the room.
    pub fn join(&self, match_id: ObjectId, connection_id: &str) -> bool {
        let added = self
            .rooms
            .entry(match_id)
            .or_default()
            .insert(connection_id.to_string());
        self.joined
            .entry(connection_id.to_string())
            .or_default()
            .insert(match_id);
        added
    }

    pub fn leave(&self, match_id: ObjectId, connection_id: &str) -> bool {
        let removed = match self.rooms.get_mut(&match_id) {
            Some(mut members) => members.remove(connection_id),
            None => false,
        };
        self.rooms.remove_if(&match_id, |_, members| members.is_empty());
        if let Some(mut rooms) = self.joined.get_mut(connection_id) {
            rooms.remove(&match_id);
        }
        self.joined.remove_if(connection_id, |_, rooms| rooms.is_empty());
        removed
    }

    /// Removes the connection from every room it joined.
    pub fn leave_all(&self, connection_id: &str) {
        let Some((_, rooms)) = self.joined.remove(connection_id) else {
            return;
        };
        for match_id in rooms {
            if let Some(mut members) = self.rooms.get_mut(&match_id) {
                members.remove(connection_id);
            }
            self.rooms.remove_if(&match_id, |_, members| members.is_empty());
        }
    }
}
