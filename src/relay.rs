//! File transfer relay
//!
//! Stateless pass-through for `FileMeta`, `FileChunk` and `FileAck` frames,
//! keyed by `receiver`. Nothing is buffered or validated server-side;
//! integrity checking belongs to the two peers via the checksum carried in
//! the file offer.

use crate::context::ServerContext;
use crate::protocol::Message;
use tracing::debug;

/// Forward a file-transfer frame to its receiver's worker.
///
/// Dropped silently when the receiver is offline; a broken target transport
/// is likewise ignored (best-effort semantics).
pub async fn forward(ctx: &ServerContext, msg: Message) {
    let Some(receiver) = msg.receiver.as_deref() else {
        debug!(kind = ?msg.kind, sender = %msg.sender, "file frame without receiver dropped");
        return;
    };
    let Some(target) = ctx.lookup_worker(receiver) else {
        debug!(kind = ?msg.kind, %receiver, "receiver offline, file frame dropped");
        return;
    };
    let _ = target.send(&msg).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::protocol::MessageKind;

    #[tokio::test]
    async fn test_offline_receiver_is_silently_dropped() {
        let ctx = ServerContext::new(ServerConfig::default());
        let msg = Message::new(MessageKind::FileChunk, "alice", Some("bob".into()), "")
            .with_chunk(0, "AAECAw==");
        // No worker registered for bob; must not panic or error.
        forward(&ctx, msg).await;
    }

    #[tokio::test]
    async fn test_missing_receiver_is_silently_dropped() {
        let ctx = ServerContext::new(ServerConfig::default());
        let msg = Message::broadcast(MessageKind::FileMeta, "alice", "");
        forward(&ctx, msg).await;
    }
}
