//! Room data model
//!
//! A room is a named, capacity-bounded set of member usernames. The member
//! set is mutated by concurrent workers, so capacity check and insert happen
//! under one write lock.

use std::collections::HashSet;
use std::sync::RwLock;
use std::time::Instant;

/// Default member capacity for rooms created without an explicit bound.
pub const DEFAULT_MAX_MEMBERS: usize = 100;

/// Named, capacity-bounded group of usernames.
#[derive(Debug)]
pub struct Room {
    name: String,
    description: String,
    created_at: Instant,
    max_members: usize,
    is_private: bool,
    owner: Option<String>,
    members: RwLock<HashSet<String>>,
}

/// Lightweight room view handed to command replies and external adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub name: String,
    pub description: String,
    pub member_count: usize,
}

impl Room {
    /// Create a public room with the default capacity.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_options(name, description, DEFAULT_MAX_MEMBERS, false, None)
    }

    pub fn with_options(
        name: impl Into<String>,
        description: impl Into<String>,
        max_members: usize,
        is_private: bool,
        owner: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            created_at: Instant::now(),
            max_members,
            is_private,
            owner,
            members: RwLock::new(HashSet::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn max_members(&self) -> usize {
        self.max_members
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn owner(&self) -> Option<String> {
        self.owner.clone()
    }

    /// Add a member. Fails if the room is at capacity or the user is
    /// already a member. Check and insert share the write lock, so the
    /// capacity bound holds under concurrent joins.
    pub fn add_member(&self, username: &str) -> bool {
        let mut members = self.members.write().unwrap();
        if members.len() >= self.max_members {
            return false;
        }
        members.insert(username.to_string())
    }

    pub fn remove_member(&self, username: &str) -> bool {
        self.members.write().unwrap().remove(username)
    }

    pub fn has_member(&self, username: &str) -> bool {
        self.members.read().unwrap().contains(username)
    }

    pub fn member_count(&self) -> usize {
        self.members.read().unwrap().len()
    }

    pub fn is_full(&self) -> bool {
        self.member_count() >= self.max_members
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().unwrap().is_empty()
    }

    /// Snapshot of the member usernames.
    pub fn members(&self) -> Vec<String> {
        self.members.read().unwrap().iter().cloned().collect()
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            member_count: self.member_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_room_creation() {
        let room = Room::new("games", "Game talk");
        assert_eq!(room.name(), "games");
        assert_eq!(room.max_members(), DEFAULT_MAX_MEMBERS);
        assert!(room.is_empty());
        assert!(!room.is_full());
    }

    #[test]
    fn test_add_and_remove_member() {
        let room = Room::new("games", "");
        assert!(room.add_member("alice"));
        assert!(!room.add_member("alice")); // duplicate
        assert!(room.has_member("alice"));
        assert_eq!(room.member_count(), 1);
        assert!(room.remove_member("alice"));
        assert!(!room.remove_member("alice"));
        assert!(room.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let room = Room::with_options("tiny", "", 2, false, None);
        assert!(room.add_member("alice"));
        assert!(room.add_member("bob"));
        assert!(room.is_full());
        assert!(!room.add_member("carol"));
        assert_eq!(room.member_count(), 2);
    }

    #[test]
    fn test_capacity_holds_under_concurrent_joins() {
        let room = Arc::new(Room::with_options("tiny", "", 10, false, None));
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let room = Arc::clone(&room);
                std::thread::spawn(move || room.add_member(&format!("user{i}")))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 10);
        assert_eq!(room.member_count(), 10);
    }

    #[test]
    fn test_summary() {
        let room = Room::new("games", "Game talk");
        room.add_member("alice");
        let summary = room.summary();
        assert_eq!(summary.name, "games");
        assert_eq!(summary.description, "Game talk");
        assert_eq!(summary.member_count, 1);
    }
}
