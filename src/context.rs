//! Shared server registry
//!
//! `ServerContext` owns the three concurrent maps (username -> session,
//! username -> worker, room name -> room) that every connection worker, the
//! router and the heartbeat monitor mutate concurrently. All access goes
//! through atomic map primitives; session admission is a single
//! insert-if-absent so two racing claims of one username can never both
//! succeed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;
use crate::heartbeat;
use crate::protocol::Message;
use crate::room::{Room, RoomSummary};
use crate::router;
use crate::session::{Session, LOBBY};
use crate::worker::ConnectionWorker;

/// Aggregate counters for monitoring adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStats {
    pub online_users: usize,
    pub active_rooms: usize,
    pub total_messages_sent: u64,
    pub total_bytes_transferred: u64,
}

/// Process-wide registry of sessions, workers and rooms.
///
/// Constructed once with the configuration; `start` launches the heartbeat
/// monitor and `stop` halts it and force-disconnects every worker.
pub struct ServerContext {
    config: ServerConfig,
    sessions: DashMap<String, Arc<Session>>,
    handlers: DashMap<String, Arc<ConnectionWorker>>,
    rooms: DashMap<String, Arc<Room>>,
    running: AtomicBool,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        let rooms = DashMap::new();
        // The lobby exists for the whole server lifetime and must admit
        // every client, so its capacity tracks max_clients rather than the
        // default room bound.
        let lobby = Room::with_options(LOBBY, "Default public chat room", config.max_clients, false, None);
        rooms.insert(LOBBY.to_string(), Arc::new(lobby));
        Self {
            config,
            sessions: DashMap::new(),
            handlers: DashMap::new(),
            rooms,
            running: AtomicBool::new(false),
            heartbeat: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // Session management

    /// Admit a session if its username is unclaimed.
    ///
    /// This is the only admission-control point: the insert is atomic, so
    /// of N workers racing to claim one username exactly one gets `true`.
    /// Admission also enters the user into the lobby's member set, keeping
    /// the session/room cross-invariant from the first instant.
    pub fn add_session(&self, session: Arc<Session>) -> bool {
        let username = session.username().to_string();
        match self.sessions.entry(username.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(session);
                if let Some(lobby) = self.get_room(LOBBY) {
                    lobby.add_member(&username);
                }
                true
            }
        }
    }

    pub fn get_session(&self, username: &str) -> Option<Arc<Session>> {
        self.sessions.get(username).map(|s| Arc::clone(s.value()))
    }

    /// Drop a session and its worker registration together.
    pub fn remove_session(&self, username: &str) -> Option<Arc<Session>> {
        self.handlers.remove(username);
        self.sessions.remove(username).map(|(_, s)| s)
    }

    pub fn online_user_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn all_usernames(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.key().clone()).collect()
    }

    /// Listing alias used by external adapters.
    pub fn list_online_usernames(&self) -> Vec<String> {
        self.all_usernames()
    }

    // Worker management

    pub fn register_worker(&self, username: &str, worker: Arc<ConnectionWorker>) {
        self.handlers.insert(username.to_string(), worker);
    }

    pub fn unregister_worker(&self, username: &str) {
        self.handlers.remove(username);
    }

    pub fn lookup_worker(&self, username: &str) -> Option<Arc<ConnectionWorker>> {
        self.handlers.get(username).map(|w| Arc::clone(w.value()))
    }

    /// Snapshot of every registered worker. Broadcast sweeps iterate the
    /// snapshot, so a worker removed mid-broadcast cannot disturb delivery
    /// to the rest.
    pub fn workers(&self) -> Vec<Arc<ConnectionWorker>> {
        self.handlers.iter().map(|w| Arc::clone(w.value())).collect()
    }

    // Room management

    /// Insert a room if the name is unclaimed.
    pub fn add_room(&self, room: Room) -> bool {
        match self.rooms.entry(room.name().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(room));
                true
            }
        }
    }

    pub fn get_room(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Delete a room. Refused for the lobby.
    pub fn remove_room(&self, name: &str) -> bool {
        if name == LOBBY {
            return false;
        }
        self.rooms.remove(name).is_some()
    }

    pub fn all_room_names(&self) -> Vec<String> {
        self.rooms.iter().map(|r| r.key().clone()).collect()
    }

    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        self.rooms.iter().map(|r| r.value().summary()).collect()
    }

    // Lifecycle

    /// Launch the heartbeat monitor.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = heartbeat::spawn(Arc::clone(self));
        *self.heartbeat.lock().unwrap() = Some(handle);
        info!("server context started");
    }

    /// Halt the heartbeat monitor and ask every worker to close.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.heartbeat.lock().unwrap().take() {
            handle.abort();
        }
        for worker in self.workers() {
            worker.request_close();
        }
        info!("server context stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Router entry point for decoded messages.
    pub async fn submit(self: &Arc<Self>, msg: Message, from: &Arc<ConnectionWorker>) {
        router::route(self, msg, from).await;
    }

    pub fn stats(&self) -> ServerStats {
        let mut total_messages_sent = 0;
        let mut total_bytes_transferred = 0;
        for session in self.sessions.iter() {
            let s = session.value();
            total_messages_sent += s.messages_sent();
            total_bytes_transferred += s.bytes_sent() + s.bytes_received();
        }
        ServerStats {
            online_users: self.sessions.len(),
            active_rooms: self.rooms.len(),
            total_messages_sent,
            total_bytes_transferred,
        }
    }
}
