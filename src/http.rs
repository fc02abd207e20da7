//! Remote JSON access shared by the page fetcher and the reference resolver.
//!
//! [`JsonSource`] is the one network seam in the pipeline. Production code uses
//! [`HttpJsonSource`]; tests inject stubs that count calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::FetchError;
use crate::user_agent;

/// Default HTTP connect timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default total per-request timeout (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Per-request timeout settings for [`HttpJsonSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Time allowed to establish a connection.
    pub connect_secs: u64,
    /// Time allowed for the whole request, body included.
    pub request_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// A source of JSON documents addressed by URL.
///
/// # Object Safety
///
/// This trait uses `async_trait` so the pipeline can hold an
/// `Arc<dyn JsonSource>` shared between the fetcher and the resolver.
#[async_trait]
pub trait JsonSource: Send + Sync {
    /// Fetches `url` and returns its parsed JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for invalid URLs, transport failures,
    /// non-success statuses, and bodies that are not JSON.
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// [`JsonSource`] backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpJsonSource {
    client: Client,
}

impl HttpJsonSource {
    /// Creates a source with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when client construction fails.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeouts(HttpTimeouts::default())
    }

    /// Creates a source with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when client construction fails.
    #[instrument(level = "debug")]
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, FetchError> {
        let client = build_http_client(timeouts)?;
        Ok(Self { client })
    }
}

/// Builds the HTTP client used for every harvester request.
///
/// # Errors
///
/// Returns [`FetchError::ClientBuild`] when the reqwest builder fails.
pub fn build_http_client(timeouts: HttpTimeouts) -> Result<Client, FetchError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.request_secs))
        .user_agent(user_agent::default_user_agent())
        .gzip(true)
        .build()
        .map_err(|error| FetchError::ClientBuild {
            reason: error.to_string(),
        })
}

/// Parses `raw` and rejects anything that is not an absolute http/https URL.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] for unparseable or non-http URLs.
pub fn parse_http_url(raw: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(raw).map_err(|_| FetchError::invalid_url(raw))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(FetchError::invalid_url(raw)),
    }
}

#[async_trait]
impl JsonSource for HttpJsonSource {
    #[instrument(level = "debug", skip(self))]
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let parsed = parse_http_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "non-success response");
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        serde_json::from_slice(&body).map_err(|e| FetchError::malformed_body(url, e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_parse_http_url_accepts_http_and_https() {
        assert!(parse_http_url("https://swapi.dev/api/people/").is_ok());
        assert!(parse_http_url("http://127.0.0.1:8080/api/people/?page=2").is_ok());
    }

    #[test]
    fn test_parse_http_url_rejects_other_schemes_and_garbage() {
        assert!(matches!(
            parse_http_url("ftp://swapi.dev/api/"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_http_url("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_http_url("/api/planets/1/"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = HttpTimeouts::default();
        assert_eq!(timeouts.connect_secs, 10);
        assert_eq!(timeouts.request_secs, 30);
    }

    #[tokio::test]
    async fn test_get_json_returns_parsed_body_and_sends_user_agent() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/planets/1/"))
            .and(header_regex("user-agent", r"^swapi-harvest/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "Tatooine"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpJsonSource::new().unwrap();
        let body = source
            .get_json(&format!("{}/api/planets/1/", server.uri()))
            .await
            .unwrap();
        assert_eq!(body["name"], "Tatooine");
    }

    #[tokio::test]
    async fn test_get_json_maps_error_status() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/people/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpJsonSource::new().unwrap();
        let result = source
            .get_json(&format!("{}/api/people/", server.uri()))
            .await;
        assert!(matches!(
            result,
            Err(FetchError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_get_json_maps_non_json_body_to_malformed() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/people/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let source = HttpJsonSource::new().unwrap();
        let result = source
            .get_json(&format!("{}/api/people/", server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::MalformedBody { .. })));
    }

    #[tokio::test]
    async fn test_get_json_times_out_on_slow_response() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let source = HttpJsonSource::with_timeouts(HttpTimeouts {
            connect_secs: 1,
            request_secs: 1,
        })
        .unwrap();
        let result = source.get_json(&format!("{}/slow", server.uri())).await;
        assert!(
            matches!(result, Err(FetchError::Timeout { .. })),
            "expected timeout, got {result:?}"
        );
    }

    #[tokio::test]
    async fn test_get_json_connection_refused_is_transport_error() {
        // Port 9 (discard) is almost never listening on localhost.
        let source = HttpJsonSource::with_timeouts(HttpTimeouts {
            connect_secs: 1,
            request_secs: 2,
        })
        .unwrap();
        let result = source.get_json("http://127.0.0.1:9/api/people/").await;
        assert!(result.as_ref().is_err_and(FetchError::is_transport));
    }
}
