//! Multi-client TCP chat server
//!
//! Clients connect over a persistent TCP connection, authenticate with a
//! unique username, and exchange broadcast messages, private messages,
//! commands and chunked file transfers through a central router.
//!
//! # Architecture
//! - `ServerContext` holds the three concurrent registries (sessions,
//!   workers, rooms) shared by every task; session admission is a single
//!   atomic insert-if-absent.
//! - One `ConnectionWorker` task per connection performs the handshake,
//!   reads frames in order and owns the exclusive write path to its peer.
//! - The router is stateless dispatch by message kind: broadcast, private
//!   delivery, commands, heartbeat replies and the file relay.
//! - A heartbeat task pings all workers each interval and disconnects peers
//!   that stop answering.
//!
//! # Wire format
//! Newline-delimited JSON. Each frame is a `Message`: kind + sender +
//! optional receiver + content + timestamp + an open string-keyed metadata
//! map for kind-specific extras.
//!
//! # Example
//! ```ignore
//! use chatterd::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ChatServer::bind(ServerConfig::default()).await?;
//!     let handle = server.handle();
//!     tokio::spawn(async move {
//!         tokio::signal::ctrl_c().await.ok();
//!         handle.shutdown();
//!     });
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod heartbeat;
pub mod protocol;
pub mod relay;
pub mod room;
pub mod rooms;
pub mod router;
pub mod server;
pub mod session;
pub mod worker;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use context::{ServerContext, ServerStats};
pub use error::{AppError, RejectReason};
pub use protocol::{Message, MessageKind};
pub use room::{Room, RoomSummary};
pub use server::{ChatServer, ServerHandle};
pub use session::{Session, LOBBY};
pub use worker::ConnectionWorker;
