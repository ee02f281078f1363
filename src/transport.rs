//! Raw HTTP transport. The SDK only ever issues JSON `POST` requests, so the capability is reduced
//! to a single method.
use async_trait::async_trait;
use reqwest::Url;

use crate::Result;

/// A JSON `POST` request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Absolute endpoint URL.
    pub url: Url,
    /// Header fields, in insertion order. `Content-Type` is added by the transport.
    pub headers: Vec<(&'static str, String)>,
    /// Encoded JSON body. `None` sends an empty body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Look up the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the server answered 200 OK. Every GoMarketMe endpoint uses 200 as its only success
    /// status.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Capability to send HTTP requests. Implementations must not retry.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a `POST` request and wait for the complete response.
    ///
    /// Returns `Err` only for transport failures. Non-200 responses are returned as `Ok`.
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Default transport backed by [`reqwest`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a fresh connection pool.
    pub fn new() -> ReqwestTransport {
        ReqwestTransport::default()
    }

    /// Create a transport reusing an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client) -> ReqwestTransport {
        ReqwestTransport { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .post(request.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, body })
    }
}
