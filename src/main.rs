//! Chat server entry point
//!
//! Binds the listener, wires ctrl-c to a graceful shutdown and runs the
//! accept loop.

use tracing::info;
use tracing_subscriber::EnvFilter;

use chatterd::{ChatServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level, e.g. RUST_LOG=chatterd=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatterd=info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let server = ChatServer::bind(config).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            handle.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}
