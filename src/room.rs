//! Private room definition
//!
//! A private room is guarded by an access key fixed when the room is
//! created, and remembers the display names that joined it.

use std::collections::HashSet;

use crate::types::RoomName;

/// Key-protected chat room
#[derive(Debug)]
pub struct PrivateRoom {
    /// Room name
    pub name: RoomName,
    /// Access key set by the first joiner; never changes afterwards
    access_key: String,
    /// Display names that have joined
    members: HashSet<String>,
}

impl PrivateRoom {
    /// Create a new room owned by `creator`, locked with `access_key`
    pub fn new(name: RoomName, access_key: impl Into<String>, creator: &str) -> Self {
        let mut members = HashSet::new();
        members.insert(creator.to_string());
        Self {
            name,
            access_key: access_key.into(),
            members,
        }
    }

    /// Check a supplied key against the room key
    pub fn key_matches(&self, supplied: &str) -> bool {
        self.access_key == supplied
    }

    /// Add a member by display name
    ///
    /// Returns false if the name was already present.
    pub fn add_member(&mut self, display_name: &str) -> bool {
        self.members.insert(display_name.to_string())
    }

    /// Remove a member by display name
    ///
    /// Returns false if the name was not present.
    pub fn remove_member(&mut self, display_name: &str) -> bool {
        self.members.remove(display_name)
    }

    pub fn contains_member(&self, display_name: &str) -> bool {
        self.members.contains(display_name)
    }

    pub fn members(&self) -> &HashSet<String> {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
