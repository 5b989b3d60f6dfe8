//! Helpers for standing up a [`wiremock`] server as the target of a
//! [`meridian_http::HttpClient`] call in tests, since the SSRF allowlist
//! otherwise rejects `127.0.0.1`/loopback hosts by design.

use meridian_http::AllowlistPolicy;
use reqwest::Url;
use wiremock::MockServer;

/// An [`AllowlistPolicy`] permitting exactly the host `server` is
/// listening on, so tests can exercise the real SSRF-validated download
/// path against a local mock instead of stubbing it out.
pub fn allowlist_for(server: &MockServer) -> AllowlistPolicy {
    let parsed = Url::parse(&server.uri()).expect("wiremock always returns a valid uri");
    let host = parsed.host_str().unwrap_or("127.0.0.1").to_string();
    let port = parsed.port().unwrap_or(80);
    AllowlistPolicy {
        allowed_hosts: vec![host.clone(), format!("{host}:{port}")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn allowlist_for_matches_the_mock_servers_own_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;
        let policy = allowlist_for(&server);
        let url = Url::parse(&server.uri()).unwrap();
        assert!(policy.allows(url.host_str().unwrap()));
    }
}
