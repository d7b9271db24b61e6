//! Server configuration
//!
//! Read-only settings consumed by the core. Defaults match the original
//! deployment; individual values can be overridden through `CHATTERD_*`
//! environment variables. Loading a config file is the operator tooling's
//! job, not the core's.

use std::env;
use std::time::Duration;

/// Runtime settings for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP listen port.
    pub port: u16,
    /// Accept backlog hint for the listening socket.
    pub backlog: u32,
    /// Socket read timeout; the backstop that unblocks a truly silent peer.
    pub socket_read_timeout: Duration,
    /// Maximum concurrent authenticated clients.
    pub max_clients: usize,
    /// Heartbeat ping period.
    pub ping_interval: Duration,
    /// How long a client may take to answer a ping.
    pub pong_timeout: Duration,
    /// Consecutive unanswered pings before a force-disconnect.
    pub max_missed_pings: u32,
    /// Chunk size clients should use for file transfers.
    pub file_chunk_size: usize,
    /// Largest file a client may offer.
    pub max_file_size: u64,
    /// Grace period granted to worker tasks during shutdown.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            backlog: 50,
            socket_read_timeout: Duration::from_secs(30),
            max_clients: 1000,
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            max_missed_pings: 3,
            file_chunk_size: 64 * 1024,
            max_file_size: 100 * 1024 * 1024,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Build a config from defaults plus `CHATTERD_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = env_parse("CHATTERD_PORT") {
            config.port = port;
        }
        if let Some(max) = env_parse("CHATTERD_MAX_CLIENTS") {
            config.max_clients = max;
        }
        if let Some(secs) = env_parse("CHATTERD_READ_TIMEOUT_SECS") {
            config.socket_read_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("CHATTERD_PING_INTERVAL_SECS") {
            config.ping_interval = Duration::from_secs(secs);
        }
        if let Some(n) = env_parse("CHATTERD_MAX_MISSED_PINGS") {
            config.max_missed_pings = n;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_clients, 1000);
        assert_eq!(config.max_missed_pings, 3);
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.file_chunk_size, 64 * 1024);
    }
}
