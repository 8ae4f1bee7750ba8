//! Room directory
//!
//! Owns the set of public rooms and the private rooms with their access
//! keys and member names. Rooms outlive their members unless the engine
//! explicitly evicts them.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::EngineError;
use crate::room::PrivateRoom;
use crate::types::{RoomName, Visibility};

/// Demo secret accepted by `KeyPolicy::Shared` when nothing else is configured
pub const DEFAULT_SHARED_KEY: &str = "letmein";

/// How private room keys are decided
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    /// The first joiner's key locks the room
    #[default]
    PerRoom,
    /// Every private room uses this one secret
    Shared(String),
}

/// Registry of public and private rooms
#[derive(Debug, Default)]
pub struct RoomDirectory {
    public: HashSet<RoomName>,
    private: HashMap<RoomName, PrivateRoom>,
    key_policy: KeyPolicy,
}

impl RoomDirectory {
    pub fn new(key_policy: KeyPolicy) -> Self {
        Self {
            public: HashSet::new(),
            private: HashMap::new(),
            key_policy,
        }
    }

    /// Create a public room if it does not exist yet
    pub fn ensure_public_room(&mut self, name: &RoomName) {
        if self.public.insert(name.clone()) {
            debug!("Public room {} created", name);
        }
    }

    /// Join (or create) a private room
    ///
    /// A missing key never matches. On `InvalidRoomKey` nothing changes.
    pub fn join_private_room(
        &mut self,
        name: &RoomName,
        display_name: &str,
        supplied_key: Option<&str>,
    ) -> Result<(), EngineError> {
        let Some(supplied_key) = supplied_key else {
            return Err(EngineError::InvalidRoomKey(name.clone()));
        };

        if let KeyPolicy::Shared(secret) = &self.key_policy {
            if secret != supplied_key {
                return Err(EngineError::InvalidRoomKey(name.clone()));
            }
        }

        match self.private.get_mut(name) {
            Some(room) => {
                if !room.key_matches(supplied_key) {
                    return Err(EngineError::InvalidRoomKey(name.clone()));
                }
                room.add_member(display_name);
            }
            None => {
                let room = PrivateRoom::new(name.clone(), supplied_key, display_name);
                self.private.insert(name.clone(), room);
                debug!("Private room {} created", name);
            }
        }

        Ok(())
    }

    /// Drop the directory-side bookkeeping for a member leaving
    ///
    /// Unknown rooms and names are treated as already left.
    pub fn leave_room(&mut self, name: &RoomName, display_name: &str, visibility: Visibility) {
        if visibility.is_private() {
            if let Some(room) = self.private.get_mut(name) {
                room.remove_member(display_name);
            }
        }
    }

    /// Remove a room of the given class entirely
    ///
    /// Returns true if a room was removed.
    pub fn evict(&mut self, name: &RoomName, visibility: Visibility) -> bool {
        let removed = match visibility {
            Visibility::Public => self.public.remove(name),
            Visibility::Private => self.private.remove(name).is_some(),
        };
        if removed {
            debug!("Room {} evicted (empty)", name);
        }
        removed
    }

    pub fn has_public_room(&self, name: &RoomName) -> bool {
        self.public.contains(name)
    }

    pub fn has_private_room(&self, name: &RoomName) -> bool {
        self.private.contains_key(name)
    }

    /// Member names of a private room, if it exists
    pub fn private_members(&self, name: &RoomName) -> Option<&HashSet<String>> {
        self.private.get(name).map(PrivateRoom::members)
    }

    /// Total number of rooms across both classes
    pub fn room_count(&self) -> usize {
        self.public.len() + self.private.len()
    }
}
