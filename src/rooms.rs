//! Room service
//!
//! Create/join/leave semantics. Every join and leave keeps the
//! cross-invariant intact: a username appears in `Session.rooms` iff it
//! appears in the corresponding `Room.members`.

use std::sync::Arc;

use tracing::debug;

use crate::context::ServerContext;
use crate::room::Room;
use crate::session::{Session, LOBBY};

/// Create a room with `creator` as owner and first member.
///
/// Fails if the name is already taken or the creator has no session.
pub fn create_room(ctx: &ServerContext, name: &str, description: &str, creator: &str) -> bool {
    let Some(session) = ctx.get_session(creator) else {
        return false;
    };
    let room = Room::with_options(
        name,
        description,
        crate::room::DEFAULT_MAX_MEMBERS,
        false,
        Some(creator.to_string()),
    );
    room.add_member(creator);
    if !ctx.add_room(room) {
        return false;
    }
    session.join_room(name);
    debug!(room = name, owner = creator, "room created");
    true
}

/// Add a user to a room.
///
/// Fails if the room is missing or full. Membership and the session's room
/// set are updated together; if the member insert loses a capacity race the
/// session side is never touched.
pub fn join_room(ctx: &ServerContext, username: &str, room_name: &str) -> bool {
    let Some(room) = ctx.get_room(room_name) else {
        return false;
    };
    let Some(session) = ctx.get_session(username) else {
        return false;
    };
    if !room.add_member(username) {
        return false;
    }
    session.join_room(room_name);
    debug!(room = room_name, user = username, "joined room");
    true
}

/// Remove a user from a room. Leaving the lobby is refused by policy.
pub fn leave_room(ctx: &ServerContext, username: &str, room_name: &str) -> bool {
    if room_name == LOBBY {
        return false;
    }
    let Some(room) = ctx.get_room(room_name) else {
        return false;
    };
    if let Some(session) = ctx.get_session(username) {
        session.leave_room(room_name);
    }
    let removed = room.remove_member(username);
    if removed {
        debug!(room = room_name, user = username, "left room");
    }
    removed
}

/// Strip a departing session out of every room it joined, lobby included.
/// Disconnect-only path; the lobby-leave policy does not apply to a session
/// that ceases to exist.
pub fn evict_all(ctx: &ServerContext, session: &Arc<Session>) {
    for room_name in session.rooms() {
        if let Some(room) = ctx.get_room(&room_name) {
            room.remove_member(session.username());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::room::Room;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn ctx_with(users: &[&str]) -> Arc<ServerContext> {
        let ctx = Arc::new(ServerContext::new(ServerConfig::default()));
        for user in users {
            assert!(ctx.add_session(Arc::new(Session::new(*user, addr()))));
        }
        ctx
    }

    #[test]
    fn test_create_room_makes_creator_owner_and_member() {
        let ctx = ctx_with(&["alice"]);
        assert!(create_room(&ctx, "games", "Game talk", "alice"));

        let room = ctx.get_room("games").unwrap();
        assert_eq!(room.owner().as_deref(), Some("alice"));
        assert!(room.has_member("alice"));
        assert!(ctx.get_session("alice").unwrap().is_in_room("games"));
    }

    #[test]
    fn test_create_room_fails_on_name_collision() {
        let ctx = ctx_with(&["alice", "bob"]);
        assert!(create_room(&ctx, "games", "", "alice"));
        assert!(!create_room(&ctx, "games", "", "bob"));
    }

    #[test]
    fn test_join_and_leave_keep_cross_invariant() {
        let ctx = ctx_with(&["alice", "bob"]);
        create_room(&ctx, "games", "", "alice");

        assert!(join_room(&ctx, "bob", "games"));
        let room = ctx.get_room("games").unwrap();
        let bob = ctx.get_session("bob").unwrap();
        assert!(room.has_member("bob") && bob.is_in_room("games"));

        assert!(leave_room(&ctx, "bob", "games"));
        assert!(!room.has_member("bob") && !bob.is_in_room("games"));
    }

    #[test]
    fn test_join_missing_room_fails() {
        let ctx = ctx_with(&["alice"]);
        assert!(!join_room(&ctx, "alice", "nowhere"));
    }

    #[test]
    fn test_join_full_room_fails_and_leaves_session_untouched() {
        let ctx = ctx_with(&["alice", "bob"]);
        let room = Room::with_options("tiny", "", 1, false, None);
        room.add_member("alice");
        ctx.add_room(room);
        ctx.get_session("alice").unwrap().join_room("tiny");

        assert!(!join_room(&ctx, "bob", "tiny"));
        assert!(!ctx.get_session("bob").unwrap().is_in_room("tiny"));
    }

    #[test]
    fn test_leave_lobby_always_refused() {
        let ctx = ctx_with(&["alice"]);
        assert!(!leave_room(&ctx, "alice", LOBBY));
        assert!(ctx.get_room(LOBBY).unwrap().has_member("alice"));
        assert!(ctx.get_session("alice").unwrap().is_in_room(LOBBY));
    }

    #[test]
    fn test_evict_all_clears_every_room_including_lobby() {
        let ctx = ctx_with(&["alice"]);
        create_room(&ctx, "games", "", "alice");
        let session = ctx.get_session("alice").unwrap();

        evict_all(&ctx, &session);
        assert!(!ctx.get_room("games").unwrap().has_member("alice"));
        assert!(!ctx.get_room(LOBBY).unwrap().has_member("alice"));
    }

    #[test]
    fn test_room_persists_when_empty() {
        let ctx = ctx_with(&["alice"]);
        create_room(&ctx, "games", "", "alice");
        leave_room(&ctx, "alice", "games");
        assert!(ctx.get_room("games").unwrap().is_empty());
        assert!(ctx.get_room("games").is_some());
    }
}
