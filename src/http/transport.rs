//! HTTP transport capability and its reqwest-backed implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;

/// Idle timeout for pooled connections.
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Connect timeout for new connections.
const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A fully prepared request. The body is materialized up front so every
/// retry attempt replays identical bytes.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub basic_auth: Option<(String, String)>,
}

impl PreparedRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
            basic_auth: None,
        }
    }

    #[must_use]
    pub fn post_json(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: Some(body.into()),
            basic_auth: None,
        }
    }

    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }
}

/// Response as seen by the retry layer: status, the `Retry-After` header if
/// present, and the fully read body.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability interface over the HTTP transport. Implementations must be
/// safe for concurrent use; one instance is shared across all workers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, req: &PreparedRequest) -> Result<TransportResponse, Error>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build the shared transport.
    ///
    /// No client-level total timeout is set; per-attempt deadlines are
    /// enforced by the retry layer and the health probe.
    ///
    /// # Errors
    /// Returns a network error if the TLS backend cannot be initialized.
    pub fn new(insecure_skip_verify: bool) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .danger_accept_invalid_certs(insecure_skip_verify)
            .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, req: &PreparedRequest) -> Result<TransportResponse, Error> {
        let mut builder = match req.method {
            HttpMethod::Get => self.client.get(&req.url),
            HttpMethod::Post => self.client.post(&req.url),
        };

        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }
        if let Some((username, password)) = &req.basic_auth {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} {}: {e}", req.method.as_str(), req.url)))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("reading response body: {e}")))?
            .to_vec();

        Ok(TransportResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepared_request_builders() {
        let req = PreparedRequest::get("https://c1:9440/x").with_basic_auth("admin", "secret");
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.body.is_none());
        assert_eq!(
            req.basic_auth,
            Some(("admin".to_string(), "secret".to_string()))
        );

        let req = PreparedRequest::post_json("https://c1:9440/x", br#"{"sendEmail":false}"#.to_vec());
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.body.as_deref(), Some(br#"{"sendEmail":false}"#.as_ref()));
        assert!(req
            .headers
            .iter()
            .any(|(k, v)| k == "Content-Type" && v == "application/json"));
    }

    #[test]
    fn test_transport_response_success() {
        let ok = TransportResponse {
            status: 204,
            retry_after: None,
            body: vec![],
        };
        assert!(ok.is_success());

        let err = TransportResponse {
            status: 503,
            retry_after: None,
            body: vec![],
        };
        assert!(!err.is_success());
    }
}
