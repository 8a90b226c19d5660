//! Mock key-set endpoint
//!
//! Wraps a wiremock server serving a key-set document at
//! [`JWKS_PATH`]. Expectations set through the `*_expecting` helpers are
//! verified when the server is dropped.

use crate::crypto_fixtures::{jwks_json, TestKeypair};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock key set is served under.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mock key-set endpoint for one tenant.
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start an empty server. Unmatched requests get 404.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Start a server publishing `keypairs` with no call expectations.
    pub async fn with_keys(keypairs: &[&TestKeypair]) -> Self {
        let server = Self::start().await;
        server.mount_keys(keypairs).await;
        server
    }

    /// Full URL of the key-set document.
    pub fn jwks_uri(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Underlying wiremock server, for custom mocks.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Publish `keypairs`.
    pub async fn mount_keys(&self, keypairs: &[&TestKeypair]) {
        Self::keys_mock(keypairs).mount(&self.server).await;
    }

    /// Publish `keypairs` and expect exactly `calls` fetches.
    pub async fn mount_keys_expecting(&self, keypairs: &[&TestKeypair], calls: u64) {
        Self::keys_mock(keypairs)
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Publish `keypairs` with a response delay and expect exactly `calls` fetches.
    pub async fn mount_slow_keys_expecting(
        &self,
        keypairs: &[&TestKeypair],
        delay: Duration,
        calls: u64,
    ) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_json(keypairs))
                    .set_delay(delay),
            )
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Answer the next `times` fetches with `status`.
    ///
    /// Mount this before the keys so the failures are served first.
    pub async fn mount_failures(&self, status: u16, times: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Serve an arbitrary body with status 200.
    pub async fn mount_raw_body(&self, body: &str) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the server has received.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }

    fn keys_mock(keypairs: &[&TestKeypair]) -> Mock {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keypairs)))
    }
}
