//! Message router
//!
//! Pure dispatch from message kind to handling logic. The router keeps no
//! state of its own; it reads the server context to find targets and
//! instructs their workers to write. A delivery failure to one target never
//! aborts delivery to the rest.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::ServerContext;
use crate::protocol::{Message, MessageKind, SERVER_NAME};
use crate::relay;
use crate::rooms;
use crate::worker::ConnectionWorker;

/// Dispatch one decoded message from an authenticated worker.
pub async fn route(ctx: &Arc<ServerContext>, msg: Message, sender: &Arc<ConnectionWorker>) {
    match msg.kind {
        MessageKind::Chat => broadcast(ctx, msg).await,
        MessageKind::Private => deliver_private(ctx, msg).await,
        MessageKind::Command => handle_command(ctx, msg, sender).await,
        MessageKind::Ping => {
            let receiver = sender.username().map(str::to_string);
            let pong = Message::new(MessageKind::Pong, SERVER_NAME, receiver, "");
            let _ = sender.send(&pong).await;
        }
        MessageKind::Pong => {
            // Heartbeat acknowledgment; the read loop already reset the
            // miss counter, this just refreshes the activity clock.
            if let Some(session) = sender.session() {
                session.touch();
            }
        }
        MessageKind::FileMeta | MessageKind::FileChunk | MessageKind::FileAck => {
            relay::forward(ctx, msg).await;
        }
        MessageKind::Disconnect => {
            debug!(sender = %msg.sender, "peer requested disconnect");
            sender.request_close();
        }
        MessageKind::Connect | MessageKind::Accept | MessageKind::Reject | MessageKind::Server => {
            warn!(kind = ?msg.kind, sender = %msg.sender, "illegal message kind post-handshake, ignored");
        }
    }
}

/// Deliver to every registered worker, sender included. Iterates a snapshot
/// of the worker map, so a client removed mid-broadcast cannot stop
/// delivery to the others.
async fn broadcast(ctx: &ServerContext, msg: Message) {
    for worker in ctx.workers() {
        let _ = worker.send(&msg).await;
    }
}

/// Broadcast a server notice to everyone.
pub async fn broadcast_notice(ctx: &ServerContext, content: impl Into<String>) {
    broadcast(ctx, Message::server_notice(content)).await;
}

async fn deliver_private(ctx: &ServerContext, msg: Message) {
    let Some(receiver) = msg.receiver.as_deref() else {
        debug!(sender = %msg.sender, "private message without receiver dropped");
        return;
    };
    match ctx.lookup_worker(receiver) {
        Some(target) => {
            let _ = target.send(&msg).await;
        }
        None => debug!(%receiver, "private message to offline user dropped"),
    }
}

/// Slash commands. `/who` and `/rooms` answer with listings; the room
/// commands front the room service. Unrecognized commands are ignored.
async fn handle_command(ctx: &ServerContext, msg: Message, sender: &Arc<ConnectionWorker>) {
    let content = msg.content.trim();
    let mut parts = content.split_whitespace();
    let command = parts.next().unwrap_or("");
    // Reply routing and room operations trust the authenticated identity
    // on the worker, never the sender field of the frame.
    let Some(username) = sender.username() else {
        return;
    };

    let reply = match command {
        "/who" => {
            let mut users = ctx.all_usernames();
            users.sort();
            Some(format!("Online users: {}", users.join(", ")))
        }
        "/rooms" => {
            let mut summaries = ctx.room_summaries();
            summaries.sort_by(|a, b| a.name.cmp(&b.name));
            let listing = summaries
                .iter()
                .map(|s| format!("{} ({})", s.name, s.member_count))
                .collect::<Vec<_>>()
                .join(", ");
            Some(format!("Available rooms: {listing}"))
        }
        "/join" => match parts.next() {
            Some(room) if rooms::join_room(ctx, username, room) => {
                Some(format!("Joined room '{room}'"))
            }
            Some(room) => Some(format!("Could not join room '{room}'")),
            None => Some("Usage: /join <room>".to_string()),
        },
        "/leave" => match parts.next() {
            Some(room) if rooms::leave_room(ctx, username, room) => {
                Some(format!("Left room '{room}'"))
            }
            Some(room) => Some(format!("Could not leave room '{room}'")),
            None => Some("Usage: /leave <room>".to_string()),
        },
        "/create" => match parts.next() {
            Some(room) => {
                let description = parts.collect::<Vec<_>>().join(" ");
                if rooms::create_room(ctx, room, &description, username) {
                    Some(format!("Created room '{room}'"))
                } else {
                    Some(format!("Could not create room '{room}'"))
                }
            }
            None => Some("Usage: /create <room> [description]".to_string()),
        },
        _ => {
            debug!(%command, sender = username, "unrecognized command ignored");
            None
        }
    };

    if let Some(text) = reply {
        let _ = sender.send(&Message::server_reply(username, text)).await;
    }
}
