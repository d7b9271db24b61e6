//! Connection acceptor and server lifecycle
//!
//! `ChatServer` binds the listening socket, accepts connections, refuses
//! peers once the server is at capacity, and spawns one worker task per
//! accepted connection. Shutdown stops the heartbeat, closes the listener,
//! force-disconnects every worker and waits out a bounded grace period
//! before hard-cancelling stragglers.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::error::AppError;
use crate::worker;

/// The running chat server: bound listener plus shared context.
pub struct ChatServer {
    ctx: Arc<ServerContext>,
    listener: TcpListener,
    shutdown: Arc<Notify>,
}

/// Clonable handle for stopping a running server and inspecting its state.
#[derive(Clone)]
pub struct ServerHandle {
    ctx: Arc<ServerContext>,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Ask the accept loop to stop. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

impl ChatServer {
    /// Bind the listening socket. Failure here is the only process-fatal
    /// error in the server.
    pub async fn bind(config: ServerConfig) -> Result<Self, AppError> {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(config.backlog)?;

        info!(addr = %listener.local_addr()?, max_clients = config.max_clients, "listening");

        Ok(Self {
            ctx: Arc::new(ServerContext::new(config)),
            listener,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            ctx: Arc::clone(&self.ctx),
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Accept connections until shutdown is requested, then tear down.
    pub async fn run(self) -> Result<(), AppError> {
        self.ctx.start();

        let mut workers = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("shutdown requested");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            // Capacity is enforced before a worker exists;
                            // an over-capacity peer is just closed.
                            if self.ctx.online_user_count() >= self.ctx.config().max_clients {
                                warn!(%peer_addr, "server at capacity, refusing connection");
                                drop(stream);
                                continue;
                            }
                            debug!(%peer_addr, "connection accepted");
                            let ctx = Arc::clone(&self.ctx);
                            workers.spawn(async move {
                                if let Err(e) = worker::handle_connection(stream, peer_addr, ctx).await {
                                    error!(%peer_addr, error = %e, "connection handler error");
                                }
                            });
                            // Reap tasks that have already finished.
                            while workers.try_join_next().is_some() {}
                        }
                        Err(e) => {
                            error!(error = %e, "accept failed");
                        }
                    }
                }
            }
        }

        // Stop accepting before disconnecting anyone.
        drop(self.listener);
        let grace = self.ctx.config().shutdown_grace;
        self.ctx.stop();

        let drained = timeout(grace, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(remaining = workers.len(), "grace period expired, aborting stragglers");
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }

        info!("server stopped");
        Ok(())
    }
}
