//! Per-user session state
//!
//! A `Session` exists from the moment a handshake succeeds until cleanup
//! runs. Fields are touched concurrently by the owning worker's read loop,
//! the router and the heartbeat monitor, so counters are atomics and the
//! activity clock and room set sit behind their own locks.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Name of the default room every session belongs to.
pub const LOBBY: &str = "lobby";

/// Server-side record of one authenticated connected user.
#[derive(Debug)]
pub struct Session {
    username: String,
    peer_addr: SocketAddr,
    connected_at: Instant,
    last_activity: RwLock<Instant>,
    missed_pings: AtomicU32,
    rooms: RwLock<HashSet<String>>,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl Session {
    /// Create a session for a freshly authenticated user.
    ///
    /// The room set starts with `lobby`; that membership can never be
    /// removed for the lifetime of the session.
    pub fn new(username: impl Into<String>, peer_addr: SocketAddr) -> Self {
        let mut rooms = HashSet::new();
        rooms.insert(LOBBY.to_string());
        Self {
            username: username.into(),
            peer_addr,
            connected_at: Instant::now(),
            last_activity: RwLock::new(Instant::now()),
            missed_pings: AtomicU32::new(0),
            rooms: RwLock::new(rooms),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Record inbound activity: refresh the activity clock and clear the
    /// missed-ping counter.
    pub fn touch(&self) {
        let mut last = self.last_activity.write().unwrap();
        *last = Instant::now();
        self.missed_pings.store(0, Ordering::Relaxed);
    }

    /// Time since the last inbound message.
    pub fn idle_time(&self) -> Duration {
        self.last_activity.read().unwrap().elapsed()
    }

    pub fn missed_pings(&self) -> u32 {
        self.missed_pings.load(Ordering::Relaxed)
    }

    /// Bump the missed-ping counter, returning the new value.
    pub fn increment_missed_pings(&self) -> u32 {
        self.missed_pings.fetch_add(1, Ordering::Relaxed) + 1
    }

    // Room membership. The room service keeps this set consistent with the
    // corresponding `Room.members` sets.

    pub fn join_room(&self, room: &str) -> bool {
        self.rooms.write().unwrap().insert(room.to_string())
    }

    /// Remove a room from the set. Leaving `lobby` is always refused.
    pub fn leave_room(&self, room: &str) -> bool {
        if room == LOBBY {
            return false;
        }
        self.rooms.write().unwrap().remove(room)
    }

    pub fn is_in_room(&self, room: &str) -> bool {
        self.rooms.read().unwrap().contains(room)
    }

    /// Snapshot of the joined room names.
    pub fn rooms(&self) -> Vec<String> {
        self.rooms.read().unwrap().iter().cloned().collect()
    }

    // Traffic counters

    pub fn record_sent(&self, bytes: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    #[test]
    fn test_new_session_is_in_lobby() {
        let session = Session::new("alice", addr());
        assert!(session.is_in_room(LOBBY));
        assert_eq!(session.rooms(), vec![LOBBY.to_string()]);
    }

    #[test]
    fn test_cannot_leave_lobby() {
        let session = Session::new("alice", addr());
        assert!(!session.leave_room(LOBBY));
        assert!(session.is_in_room(LOBBY));
    }

    #[test]
    fn test_join_and_leave_room() {
        let session = Session::new("alice", addr());
        assert!(session.join_room("games"));
        assert!(!session.join_room("games")); // already joined
        assert!(session.is_in_room("games"));
        assert!(session.leave_room("games"));
        assert!(!session.is_in_room("games"));
    }

    #[test]
    fn test_touch_resets_missed_pings() {
        let session = Session::new("alice", addr());
        assert_eq!(session.increment_missed_pings(), 1);
        assert_eq!(session.increment_missed_pings(), 2);
        session.touch();
        assert_eq!(session.missed_pings(), 0);
    }

    #[test]
    fn test_traffic_counters() {
        let session = Session::new("alice", addr());
        session.record_sent(100);
        session.record_sent(50);
        session.record_received(30);
        assert_eq!(session.messages_sent(), 2);
        assert_eq!(session.bytes_sent(), 150);
        assert_eq!(session.messages_received(), 1);
        assert_eq!(session.bytes_received(), 30);
    }
}
