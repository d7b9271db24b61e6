//! Username admission
//!
//! Authentication is uniqueness-of-name only: validate the candidate, then
//! claim it through the context's atomic insert. No check-then-insert
//! two-step anywhere on this path.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::context::ServerContext;
use crate::error::RejectReason;
use crate::session::Session;

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 20;

/// Validate a candidate username and claim it atomically.
///
/// On success the returned session is already registered (and a lobby
/// member). Exactly one of any number of concurrent claims for the same
/// name succeeds.
pub fn try_claim(
    ctx: &Arc<ServerContext>,
    candidate: &str,
    peer_addr: SocketAddr,
) -> Result<Arc<Session>, RejectReason> {
    let username = candidate.trim();
    if username.is_empty() {
        return Err(RejectReason::EmptyUsername);
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(RejectReason::UsernameTooLong(MAX_USERNAME_LEN));
    }

    let session = Arc::new(Session::new(username, peer_addr));
    if ctx.add_session(Arc::clone(&session)) {
        Ok(session)
    } else {
        Err(RejectReason::UsernameTaken(username.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn ctx() -> Arc<ServerContext> {
        Arc::new(ServerContext::new(ServerConfig::default()))
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    #[test]
    fn test_claim_succeeds_for_fresh_name() {
        let ctx = ctx();
        let session = try_claim(&ctx, "alice", addr()).unwrap();
        assert_eq!(session.username(), "alice");
        assert!(ctx.get_session("alice").is_some());
    }

    #[test]
    fn test_claim_trims_whitespace() {
        let ctx = ctx();
        let session = try_claim(&ctx, "  alice  ", addr()).unwrap();
        assert_eq!(session.username(), "alice");
    }

    #[test]
    fn test_empty_name_rejected() {
        let ctx = ctx();
        assert_eq!(try_claim(&ctx, "   ", addr()).unwrap_err(), RejectReason::EmptyUsername);
    }

    #[test]
    fn test_oversized_name_rejected() {
        let ctx = ctx();
        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        assert_eq!(
            try_claim(&ctx, &long, addr()).unwrap_err(),
            RejectReason::UsernameTooLong(MAX_USERNAME_LEN)
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let ctx = ctx();
        try_claim(&ctx, "alice", addr()).unwrap();
        assert_eq!(
            try_claim(&ctx, "alice", addr()).unwrap_err(),
            RejectReason::UsernameTaken("alice".to_string())
        );
    }

    #[test]
    fn test_name_reusable_after_removal() {
        let ctx = ctx();
        try_claim(&ctx, "alice", addr()).unwrap();
        ctx.remove_session("alice");
        assert!(try_claim(&ctx, "alice", addr()).is_ok());
    }
}
