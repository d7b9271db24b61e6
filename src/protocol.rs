//! Wire protocol definitions
//!
//! JSON-based message protocol using Serde's tagged kind field.
//! One message per line: a serialized `Message` followed by `\n`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key: file name on a `FileMeta` offer.
pub const META_FILENAME: &str = "filename";
/// Metadata key: total file size in bytes on a `FileMeta` offer.
pub const META_FILE_SIZE: &str = "file_size";
/// Metadata key: whole-file checksum on a `FileMeta` offer.
pub const META_CHECKSUM: &str = "checksum";
/// Metadata key: 0-based chunk sequence number on a `FileChunk`.
pub const META_SEQUENCE: &str = "sequence";
/// Metadata key: sender-encoded chunk payload on a `FileChunk`.
pub const META_DATA: &str = "data";
/// Metadata key: room name on room-scoped server notices.
pub const META_ROOM: &str = "room";
/// Metadata key: server version stamped on `Accept`.
pub const META_SERVER_VERSION: &str = "server_version";

/// Sender name used for all server-originated messages.
pub const SERVER_NAME: &str = "SERVER";

/// Server version advertised during the handshake.
pub const SERVER_VERSION: &str = "0.1.0";

/// Message kind discriminant
///
/// Every frame on the wire carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Client -> Server: handshake request carrying a candidate username
    Connect,
    /// Server -> Client: handshake accepted
    Accept,
    /// Server -> Client: handshake rejected (reason in content)
    Reject,
    /// Broadcast chat message
    Chat,
    /// 1:1 message for `receiver`
    Private,
    /// Slash command in `content` (`/who`, `/rooms`, ...)
    Command,
    /// File offer: filename/size/checksum in metadata
    FileMeta,
    /// File chunk: sequence + payload in metadata
    FileChunk,
    /// Chunk acknowledgment, relayed back to the sender
    FileAck,
    /// Liveness probe
    Ping,
    /// Liveness reply
    Pong,
    /// Graceful disconnect request
    Disconnect,
    /// Server notice
    Server,
}

/// A single protocol message
///
/// `receiver` of `None` means broadcast. `metadata` is an open string-keyed
/// map carrying kind-specific extras so new fields never break the wire
/// shape. Handlers may rewrite `kind` and `content` before relaying; the
/// remaining fields are fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Message {
    /// Create a message addressed to a single receiver.
    pub fn new(
        kind: MessageKind,
        sender: impl Into<String>,
        receiver: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            sender: sender.into(),
            receiver,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Create a broadcast message (no receiver).
    pub fn broadcast(kind: MessageKind, sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(kind, sender, None, content)
    }

    /// Create a `Server` notice for everyone.
    pub fn server_notice(content: impl Into<String>) -> Self {
        Self::broadcast(MessageKind::Server, SERVER_NAME, content)
    }

    /// Create a `Server` reply addressed to one user.
    pub fn server_reply(receiver: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageKind::Server, SERVER_NAME, Some(receiver.into()), content)
    }

    /// Insert a metadata entry, consuming and returning the message.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Look up a string-valued metadata entry.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Look up an integer-valued metadata entry.
    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }

    /// Attach file offer metadata (for `FileMeta`).
    pub fn with_file_meta(self, filename: &str, file_size: u64, checksum: &str) -> Self {
        self.with_metadata(META_FILENAME, filename)
            .with_metadata(META_FILE_SIZE, file_size)
            .with_metadata(META_CHECKSUM, checksum)
    }

    /// Attach chunk metadata (for `FileChunk`). The payload is whatever
    /// encoding the sending client chose; the server never decodes it.
    pub fn with_chunk(self, sequence: u64, data: &str) -> Self {
        self.with_metadata(META_SEQUENCE, sequence)
            .with_metadata(META_DATA, data)
    }

    pub fn filename(&self) -> Option<&str> {
        self.metadata_str(META_FILENAME)
    }

    pub fn file_size(&self) -> Option<u64> {
        self.metadata_u64(META_FILE_SIZE)
    }

    pub fn checksum(&self) -> Option<&str> {
        self.metadata_str(META_CHECKSUM)
    }

    pub fn sequence(&self) -> Option<u64> {
        self.metadata_u64(META_SEQUENCE)
    }

    pub fn room(&self) -> Option<&str> {
        self.metadata_str(META_ROOM)
    }

    /// Serialize to a single wire frame (JSON + trailing newline).
    pub fn to_frame(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse one wire frame (a line without its terminator).
    pub fn from_frame(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&MessageKind::FileChunk).unwrap();
        assert_eq!(json, "\"file_chunk\"");
    }

    #[test]
    fn test_broadcast_has_no_receiver_field() {
        let msg = Message::broadcast(MessageKind::Chat, "alice", "hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("receiver"));
        assert!(json.contains("\"kind\":\"chat\""));
    }

    #[test]
    fn test_frame_round_trip() {
        let msg = Message::new(MessageKind::Private, "alice", Some("bob".into()), "hi");
        let frame = msg.to_frame().unwrap();
        assert_eq!(*frame.last().unwrap(), b'\n');

        let line = std::str::from_utf8(&frame[..frame.len() - 1]).unwrap();
        let parsed = Message::from_frame(line).unwrap();
        assert_eq!(parsed.kind, MessageKind::Private);
        assert_eq!(parsed.receiver.as_deref(), Some("bob"));
        assert_eq!(parsed.content, "hi");
    }

    #[test]
    fn test_file_meta_accessors() {
        let msg = Message::new(MessageKind::FileMeta, "alice", Some("bob".into()), "")
            .with_file_meta("report.pdf", 1_048_576, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(msg.filename(), Some("report.pdf"));
        assert_eq!(msg.file_size(), Some(1_048_576));
        assert_eq!(msg.checksum(), Some("d41d8cd98f00b204e9800998ecf8427e"));
    }

    #[test]
    fn test_chunk_accessors() {
        let msg = Message::new(MessageKind::FileChunk, "alice", Some("bob".into()), "")
            .with_chunk(7, "AAECAw==");
        assert_eq!(msg.sequence(), Some(7));
        assert_eq!(msg.metadata_str(META_DATA), Some("AAECAw=="));
    }

    #[test]
    fn test_missing_metadata_is_none() {
        let msg = Message::broadcast(MessageKind::Chat, "alice", "hello");
        assert!(msg.filename().is_none());
        assert!(msg.sequence().is_none());
    }

    #[test]
    fn test_metadata_survives_round_trip() {
        let msg = Message::server_notice("bob joined #games")
            .with_metadata(META_ROOM, "games");
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.room(), Some("games"));
    }
}
