//! Room engine
//!
//! Join, leave, send and disconnect as single atomic state transitions
//! over the connection registry and room directory. The engine never
//! does I/O: every operation returns the deliveries it produced and the
//! caller hands them to the transport.

use std::collections::HashSet;

use tracing::debug;

use crate::directory::{KeyPolicy, RoomDirectory};
use crate::error::EngineError;
use crate::message::ServerMessage;
use crate::registry::{ConnectionRegistry, Membership};
use crate::types::{ConnectionId, RoomName, Visibility};

/// A message addressed to one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub target: ConnectionId,
    pub message: ServerMessage,
}

/// Behavior switches. All off by default: anyone may send into any room
/// and a leave always broadcasts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Reject Send from connections that have not joined the room
    pub strict_send: bool,
    /// Skip the leave broadcast when the connection never joined the room
    pub strict_leave: bool,
    /// Delete a room once its last subscriber is gone
    pub evict_empty_rooms: bool,
}

/// Owns all chat state
#[derive(Debug, Default)]
pub struct RoomEngine {
    registry: ConnectionRegistry,
    directory: RoomDirectory,
    options: EngineOptions,
}

impl RoomEngine {
    pub fn new(key_policy: KeyPolicy, options: EngineOptions) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            directory: RoomDirectory::new(key_policy),
            options,
        }
    }

    /// Register a new connection
    pub fn connect(&mut self, id: ConnectionId) -> Result<(), EngineError> {
        self.registry.register(id)
    }

    /// Join a room
    ///
    /// The joined notice goes to every subscriber of the room, the joiner
    /// included. On error no membership is created and nothing is broadcast.
    pub fn join(
        &mut self,
        id: ConnectionId,
        room: &RoomName,
        display_name: &str,
        visibility: Visibility,
        key: Option<&str>,
    ) -> Result<Vec<Outbound>, EngineError> {
        // Checked up front so a directory change is never left without its edge
        if !self.registry.is_registered(id) {
            return Err(EngineError::UnknownConnection(id));
        }

        match visibility {
            Visibility::Public => self.directory.ensure_public_room(room),
            Visibility::Private => self.directory.join_private_room(room, display_name, key)?,
        }

        let membership = Membership::new(display_name, visibility);

        // A re-join under another name or class replaces the edge, so the
        // old directory bookkeeping goes with it
        if let Some(previous) = self.registry.membership(id, room).cloned() {
            if previous != membership {
                self.directory
                    .leave_room(room, &previous.display_name, previous.visibility);
            }
        }

        self.registry.add_subscription(id, room.clone(), membership)?;

        debug!(
            "Connection {} joined {} as '{}' ({} subscribers)",
            id,
            room,
            display_name,
            self.registry.subscriber_count(room)
        );

        Ok(self.broadcast(room, ServerMessage::joined(display_name, room.as_str())))
    }

    /// Leave a room
    ///
    /// The left notice goes to the subscribers that remain. Unless
    /// `strict_leave` is set, leaving a room that was never joined still
    /// broadcasts.
    pub fn leave(
        &mut self,
        id: ConnectionId,
        room: &RoomName,
        display_name: &str,
        visibility: Visibility,
    ) -> Result<Vec<Outbound>, EngineError> {
        let removed = self.registry.remove_subscription(id, room)?;
        if removed.is_none() && self.options.strict_leave {
            debug!("Connection {} left {} without joining, ignored", id, room);
            return Ok(Vec::new());
        }

        self.directory.leave_room(room, display_name, visibility);
        self.evict_if_empty(room, visibility);

        debug!(
            "Connection {} left {} ({} subscribers)",
            id,
            room,
            self.registry.subscriber_count(room)
        );

        Ok(self.broadcast(room, ServerMessage::left(display_name, room.as_str())))
    }

    /// Broadcast a chat line into a room
    ///
    /// Without `strict_send` the sender does not have to be a member,
    /// or even registered.
    pub fn send(
        &mut self,
        id: ConnectionId,
        room: &RoomName,
        display_name: &str,
        text: &str,
    ) -> Result<Vec<Outbound>, EngineError> {
        if self.options.strict_send && self.registry.membership(id, room).is_none() {
            return Err(EngineError::NotInRoom(room.clone()));
        }

        Ok(self.broadcast(room, ServerMessage::chat(display_name, text)))
    }

    /// Leave every subscribed room, then forget the connection
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<Vec<Outbound>, EngineError> {
        let mut rooms: Vec<RoomName> = self.registry.subscriptions_of(id)?.into_iter().collect();
        rooms.sort();

        let mut outbound = Vec::new();
        for room in rooms {
            let Some(membership) = self.registry.membership(id, &room).cloned() else {
                continue;
            };
            outbound.extend(self.leave(
                id,
                &room,
                &membership.display_name,
                membership.visibility,
            )?);
        }

        self.registry.unregister(id)?;

        debug!(
            "Connection {} removed, {} connections, {} rooms",
            id,
            self.registry.connection_count(),
            self.directory.room_count()
        );

        Ok(outbound)
    }

    /// Visibility recorded on the connection's membership in a room
    pub fn membership_visibility(&self, id: ConnectionId, room: &RoomName) -> Option<Visibility> {
        self.registry.membership(id, room).map(|m| m.visibility)
    }

    /// Member names of a private room, if it exists
    pub fn private_members(&self, room: &RoomName) -> Option<&HashSet<String>> {
        self.directory.private_members(room)
    }

    pub fn subscribers(&self, room: &RoomName) -> Vec<ConnectionId> {
        self.registry.subscribers(room)
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.registry.is_registered(id)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    pub fn room_count(&self) -> usize {
        self.directory.room_count()
    }

    fn broadcast(&self, room: &RoomName, message: ServerMessage) -> Vec<Outbound> {
        self.registry
            .subscribers(room)
            .into_iter()
            .map(|target| Outbound {
                target,
                message: message.clone(),
            })
            .collect()
    }

    fn evict_if_empty(&mut self, room: &RoomName, visibility: Visibility) {
        if self.options.evict_empty_rooms && self.registry.subscriber_count(room) == 0 {
            self.directory.evict(room, visibility);
        }
    }
}
