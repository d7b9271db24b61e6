//! Heartbeat monitor
//!
//! One periodic task pings every registered worker and force-disconnects
//! the unresponsive. A peer that answers (or sends anything at all) has its
//! miss counter reset by the worker's read loop, so a responsive client
//! never accumulates misses. A failure against one target is skipped and
//! never aborts the remaining targets in that tick.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::context::ServerContext;
use crate::protocol::{Message, MessageKind, SERVER_NAME};

/// Spawn the recurring heartbeat task. Aborted by `ServerContext::stop`.
pub(crate) fn spawn(ctx: Arc<ServerContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(ctx.config().ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; consume that so the first real tick
        // lands one full period after start.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !ctx.is_running() {
                break;
            }
            tick(&ctx).await;
        }
    })
}

/// One sweep over all registered workers.
async fn tick(ctx: &ServerContext) {
    let max_missed = ctx.config().max_missed_pings;

    for worker in ctx.workers() {
        let Some(username) = worker.username().map(str::to_string) else {
            continue;
        };
        let Some(session) = ctx.get_session(&username) else {
            continue;
        };

        if session.missed_pings() >= max_missed {
            warn!(%username, missed = session.missed_pings(), "heartbeat timeout, disconnecting");
            worker.request_close();
            continue;
        }

        let ping = Message::new(MessageKind::Ping, SERVER_NAME, Some(username.clone()), "");
        if worker.send(&ping).await.is_err() {
            // A ping that never went out is not a miss the peer can answer.
            debug!(%username, "ping send failed, skipping");
            continue;
        }
        session.increment_missed_pings();
    }
}
