//! Connection worker
//!
//! One worker task owns each accepted TCP connection: it performs the
//! Connect/Accept-or-Reject handshake, then loops reading frames and handing
//! them to the router. The worker holds the exclusive right to write to its
//! peer; the write half sits behind a mutex because the read loop, the
//! router and the heartbeat monitor all send concurrently.
//!
//! Lifecycle: `Handshaking -> Active -> Closing -> Closed`. Cleanup is
//! one-shot no matter whether the trigger was a peer disconnect, a read
//! error, the heartbeat monitor or server shutdown.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::context::ServerContext;
use crate::error::AppError;
use crate::protocol::{Message, MessageKind, META_SERVER_VERSION, SERVER_NAME, SERVER_VERSION};
use crate::rooms;
use crate::router;
use crate::session::Session;

const STATE_HANDSHAKING: u8 = 0;
const STATE_ACTIVE: u8 = 1;
const STATE_CLOSING: u8 = 2;
const STATE_CLOSED: u8 = 3;

/// The task-owned side of one client connection.
///
/// Shared (behind `Arc`) with the server context so the router and the
/// heartbeat monitor can write to the peer and request a close.
pub struct ConnectionWorker {
    id: Uuid,
    peer_addr: SocketAddr,
    writer: Mutex<OwnedWriteHalf>,
    state: AtomicU8,
    close: Notify,
    cleaned: AtomicBool,
    username: OnceLock<String>,
    session: OnceLock<Arc<Session>>,
}

impl ConnectionWorker {
    pub(crate) fn new(writer: OwnedWriteHalf, peer_addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_addr,
            writer: Mutex::new(writer),
            state: AtomicU8::new(STATE_HANDSHAKING),
            close: Notify::new(),
            cleaned: AtomicBool::new(false),
            username: OnceLock::new(),
            session: OnceLock::new(),
        }
    }

    /// Connection id for log correlation before a username exists.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Username, once the handshake has succeeded.
    pub fn username(&self) -> Option<&str> {
        self.username.get().map(String::as_str)
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.get()
    }

    pub(crate) fn attach(&self, session: Arc<Session>) {
        let _ = self.username.set(session.username().to_string());
        let _ = self.session.set(session);
    }

    /// Serialize and write one message to the peer.
    ///
    /// The writer mutex makes the outbound path mutually exclusive; a frame
    /// is never interleaved with another. Errors are terminal for this
    /// connection only.
    pub async fn send(&self, msg: &Message) -> Result<(), AppError> {
        if self.state.load(Ordering::Acquire) == STATE_CLOSED {
            return Err(AppError::ConnectionClosed);
        }
        let frame = msg.to_frame()?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        if let Some(session) = self.session.get() {
            session.record_sent(frame.len() as u64);
        }
        Ok(())
    }

    /// Ask this worker to close. Safe to call from any task, any number of
    /// times; the read loop wakes up and runs cleanup exactly once.
    pub fn request_close(&self) {
        let _ = self
            .state
            .compare_exchange(STATE_ACTIVE, STATE_CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .or_else(|_| {
                self.state.compare_exchange(
                    STATE_HANDSHAKING,
                    STATE_CLOSING,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
            });
        self.close.notify_one();
    }

    pub fn is_closing(&self) -> bool {
        self.state.load(Ordering::Acquire) >= STATE_CLOSING
    }

    /// Promote to Active. A close requested during the handshake wins the
    /// race: the state stays Closing and the read loop exits immediately.
    fn enter_active(&self) {
        let _ = self.state.compare_exchange(
            STATE_HANDSHAKING,
            STATE_ACTIVE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// One-shot cleanup gate. Only the first caller gets `true`.
    fn begin_cleanup(&self) -> bool {
        self.state.store(STATE_CLOSED, Ordering::Release);
        !self.cleaned.swap(true, Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ConnectionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionWorker")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("username", &self.username.get())
            .finish()
    }
}

/// Drive one accepted connection through its whole lifecycle.
///
/// Returns when the connection is closed and cleanup has run. Any error is
/// scoped to this connection and never propagates to other workers.
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ServerContext>,
) -> Result<(), AppError> {
    let (read_half, write_half) = stream.into_split();
    let worker = Arc::new(ConnectionWorker::new(write_half, peer_addr));
    let mut reader = BufReader::new(read_half);

    debug!(conn = %worker.id(), %peer_addr, "new connection");

    // Handshake: the first frame must be Connect with a candidate username.
    let session = match handshake(&ctx, &worker, &mut reader).await {
        Ok(session) => session,
        Err(AppError::HandshakeRejected(reason)) => {
            info!(conn = %worker.id(), %peer_addr, %reason, "handshake rejected");
            let reject = Message::new(MessageKind::Reject, SERVER_NAME, None, reason.to_string());
            let _ = worker.send(&reject).await;
            cleanup(&ctx, &worker).await;
            return Ok(());
        }
        Err(e) => {
            debug!(conn = %worker.id(), %peer_addr, error = %e, "handshake aborted");
            // The claim may already have gone through (the Accept write can
            // fail after registration); cleanup releases it and is a no-op
            // for a connection that never authenticated.
            cleanup(&ctx, &worker).await;
            return Ok(());
        }
    };

    let username = session.username().to_string();
    info!(%username, %peer_addr, "user authenticated");

    read_loop(&ctx, &worker, &mut reader, &session).await;

    cleanup(&ctx, &worker).await;
    Ok(())
}

async fn handshake(
    ctx: &Arc<ServerContext>,
    worker: &Arc<ConnectionWorker>,
    reader: &mut BufReader<OwnedReadHalf>,
) -> Result<Arc<Session>, AppError> {
    let (msg, _) = read_frame(ctx, reader).await?;
    if msg.kind != MessageKind::Connect {
        return Err(crate::error::RejectReason::NotConnect.into());
    }

    let session = auth::try_claim(ctx, &msg.sender, worker.peer_addr())?;
    worker.attach(Arc::clone(&session));
    ctx.register_worker(session.username(), Arc::clone(worker));
    worker.enter_active();

    let accept = Message::new(MessageKind::Accept, SERVER_NAME, Some(session.username().to_string()), "Welcome!")
        .with_metadata(META_SERVER_VERSION, SERVER_VERSION);
    worker.send(&accept).await?;

    router::broadcast_notice(ctx, format!("{} joined the chat", session.username())).await;

    Ok(session)
}

/// The active message loop: single reader per connection, so a peer's
/// messages are processed strictly in arrival order.
async fn read_loop(
    ctx: &Arc<ServerContext>,
    worker: &Arc<ConnectionWorker>,
    reader: &mut BufReader<OwnedReadHalf>,
    session: &Arc<Session>,
) {
    loop {
        tokio::select! {
            _ = worker.close.notified() => {
                debug!(username = ?worker.username(), "close requested");
                break;
            }
            result = read_frame(ctx, reader) => {
                let (msg, frame_len) = match result {
                    Ok(frame) => frame,
                    Err(AppError::ReadTimeout) => {
                        warn!(username = ?worker.username(), "read timed out, closing");
                        worker.request_close();
                        break;
                    }
                    Err(AppError::ConnectionClosed) => {
                        debug!(username = ?worker.username(), "peer closed connection");
                        worker.request_close();
                        break;
                    }
                    Err(e) => {
                        warn!(username = ?worker.username(), error = %e, "read failed, closing");
                        worker.request_close();
                        break;
                    }
                };

                session.touch();
                session.record_received(frame_len);
                ctx.submit(msg, worker).await;

                if worker.is_closing() {
                    break;
                }
            }
        }
    }
}

/// Read and decode one frame, applying the socket read timeout backstop.
/// Returns the message together with its wire length for the traffic
/// counters.
async fn read_frame(
    ctx: &Arc<ServerContext>,
    reader: &mut BufReader<OwnedReadHalf>,
) -> Result<(Message, u64), AppError> {
    let mut line = String::new();
    let read = timeout(ctx.config().socket_read_timeout, reader.read_line(&mut line))
        .await
        .map_err(|_| AppError::ReadTimeout)??;
    if read == 0 {
        return Err(AppError::ConnectionClosed);
    }
    let msg = Message::from_frame(line.trim_end())?;
    Ok((msg, read as u64))
}

/// Idempotent teardown: deregister, leave every room, announce departure,
/// release the transport. Runs exactly once even when a self-detected error
/// and a heartbeat-forced disconnect race.
async fn cleanup(ctx: &Arc<ServerContext>, worker: &Arc<ConnectionWorker>) {
    if !worker.begin_cleanup() {
        return;
    }

    let Some(username) = worker.username().map(str::to_string) else {
        return; // never authenticated, nothing registered
    };

    info!(%username, "cleaning up connection");

    if let Some(session) = ctx.remove_session(&username) {
        rooms::evict_all(ctx, &session);
    }

    router::broadcast_notice(ctx, format!("{username} left the chat")).await;

    let mut writer = worker.writer.lock().await;
    let _ = writer.shutdown().await;
}
