//! Loopback sockets for integration tests.
//!
//! Some sandboxes refuse even a bind to 127.0.0.1. Tests that need a socket
//! get `None` there and return early; setting `MIRROR_STRICT_NET=1` turns
//! that case into a failure so CI cannot silently skip them.

// Each test binary uses only one of the helpers
#![allow(dead_code)]

use tokio::net::TcpListener;
use wiremock::MockServer;

const STRICT_NET_VAR: &str = "MIRROR_STRICT_NET";

/// Whether this environment lets the test bind a loopback port.
fn loopback_allowed() -> bool {
    if std::net::TcpListener::bind(("127.0.0.1", 0)).is_ok() {
        return true;
    }
    let strict = std::env::var(STRICT_NET_VAR).is_ok_and(|value| value.trim() == "1");
    assert!(!strict, "loopback bind refused while {STRICT_NET_VAR}=1");
    eprintln!("loopback bind refused; skipping socket test ({STRICT_NET_VAR}=1 to fail instead)");
    false
}

/// Starts a wiremock server, or `None` without loopback access.
pub async fn mock_server() -> Option<MockServer> {
    if loopback_allowed() {
        Some(MockServer::start().await)
    } else {
        None
    }
}

/// Binds a raw listener on an ephemeral loopback port.
pub async fn loopback_listener() -> Option<TcpListener> {
    if !loopback_allowed() {
        return None;
    }
    TcpListener::bind(("127.0.0.1", 0)).await.ok()
}
