//! Localhost socket check for wiremock-backed unit tests.

use std::net::TcpListener;

use wiremock::MockServer;

/// Starts a mock server, or returns `None` when no localhost socket can be
/// bound. `HARVEST_REQUIRE_SOCKET_TESTS=1` turns the skip into a failure.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return Some(MockServer::start().await);
    }
    let required = std::env::var("HARVEST_REQUIRE_SOCKET_TESTS").is_ok_and(|value| value == "1");
    assert!(!required, "cannot bind a localhost socket for wiremock");
    eprintln!("cannot bind a localhost socket; skipping wiremock test");
    None
}
