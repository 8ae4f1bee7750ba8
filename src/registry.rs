//! Connection registry
//!
//! Tracks every registered connection and the rooms it is subscribed to.
//! A reverse index (room -> connections) is kept alongside so room
//! broadcasts do not need to scan every connection.

use std::collections::{HashMap, HashSet};

use crate::error::EngineError;
use crate::types::{ConnectionId, RoomName, Visibility};

/// One membership edge, as seen from the connection's side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Name the connection joined with
    pub display_name: String,
    /// Class of the room that was joined
    pub visibility: Visibility,
}

impl Membership {
    pub fn new(display_name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            display_name: display_name.into(),
            visibility,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// ConnectionId -> (RoomName -> Membership)
    connections: HashMap<ConnectionId, HashMap<RoomName, Membership>>,
    /// RoomName -> subscribed connections
    subscribers: HashMap<RoomName, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection with no subscriptions
    pub fn register(&mut self, id: ConnectionId) -> Result<(), EngineError> {
        if self.connections.contains_key(&id) {
            return Err(EngineError::DuplicateConnection(id));
        }
        self.connections.insert(id, HashMap::new());
        Ok(())
    }

    /// Remove a connection, returning every edge it held
    pub fn unregister(
        &mut self,
        id: ConnectionId,
    ) -> Result<Vec<(RoomName, Membership)>, EngineError> {
        let rooms = self
            .connections
            .remove(&id)
            .ok_or(EngineError::UnknownConnection(id))?;

        let mut edges: Vec<(RoomName, Membership)> = rooms.into_iter().collect();
        edges.sort_by(|a, b| a.0.cmp(&b.0));

        for (room, _) in &edges {
            self.unindex(room, id);
        }
        Ok(edges)
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Rooms the connection is currently subscribed to
    pub fn subscriptions_of(&self, id: ConnectionId) -> Result<HashSet<RoomName>, EngineError> {
        self.connections
            .get(&id)
            .map(|rooms| rooms.keys().cloned().collect())
            .ok_or(EngineError::UnknownConnection(id))
    }

    /// The edge between a connection and a room, if any
    pub fn membership(&self, id: ConnectionId, room: &RoomName) -> Option<&Membership> {
        self.connections.get(&id).and_then(|rooms| rooms.get(room))
    }

    /// Add (or replace) a membership edge
    pub fn add_subscription(
        &mut self,
        id: ConnectionId,
        room: RoomName,
        membership: Membership,
    ) -> Result<(), EngineError> {
        let rooms = self
            .connections
            .get_mut(&id)
            .ok_or(EngineError::UnknownConnection(id))?;

        self.subscribers.entry(room.clone()).or_default().insert(id);
        rooms.insert(room, membership);
        Ok(())
    }

    /// Remove a membership edge, returning it if it existed
    pub fn remove_subscription(
        &mut self,
        id: ConnectionId,
        room: &RoomName,
    ) -> Result<Option<Membership>, EngineError> {
        let rooms = self
            .connections
            .get_mut(&id)
            .ok_or(EngineError::UnknownConnection(id))?;

        let removed = rooms.remove(room);
        if removed.is_some() {
            self.unindex(room, id);
        }
        Ok(removed)
    }

    /// Connections subscribed to a room, in a stable order
    pub fn subscribers(&self, room: &RoomName) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .subscribers
            .get(room)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn subscriber_count(&self, room: &RoomName) -> usize {
        self.subscribers.get(room).map_or(0, HashSet::len)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn unindex(&mut self, room: &RoomName, id: ConnectionId) {
        if let Some(set) = self.subscribers.get_mut(room) {
            set.remove(&id);
            if set.is_empty() {
                self.subscribers.remove(room);
            }
        }
    }
}
