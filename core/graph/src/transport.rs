//! Wire transport for Graph API requests.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Method};
use std::time::Duration;

use cirrusdrive_common::{Error, Result};

/// Per-request timeout; a timed-out call surfaces as a network error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A single API request, before authorization is attached.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub content_type: Option<&'static str>,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// Create a bodyless request.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            content_type: None,
            body: None,
        }
    }

    /// Attach a JSON body.
    pub fn json(mut self, value: &serde_json::Value) -> Self {
        self.content_type = Some("application/json");
        self.body = Some(value.to_string().into_bytes());
        self
    }

    /// Attach a raw octet-stream body.
    pub fn raw(mut self, bytes: Vec<u8>) -> Self {
        self.content_type = Some("application/octet-stream");
        self.body = Some(bytes);
        self
    }
}

/// Raw response from the wire, before status mapping.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Response body as lossy UTF-8, for error reporting.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes requests against the remote API.
///
/// The bearer token is passed per call so the request path can replay an
/// identical request with a renewed token.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest, bearer: &str) -> Result<RawResponse>;
}

/// HTTPS transport backed by reqwest.
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Create a transport with the default timeout and user agent.
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent(concat!("CirrusDrive/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self { http }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest, bearer: &str) -> Result<RawResponse> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer));

        if let Some(content_type) = request.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {}", e)))?;

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_request_json_body() {
        let request = ApiRequest::new(Method::POST, "https://example.invalid/items")
            .json(&serde_json::json!({"name": "docs"}));

        assert_eq!(request.content_type, Some("application/json"));
        let body = request.body.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["name"], "docs");
    }

    #[test]
    fn test_api_request_raw_body() {
        let request =
            ApiRequest::new(Method::PUT, "https://example.invalid/content").raw(vec![1, 2, 3]);

        assert_eq!(request.content_type, Some("application/octet-stream"));
        assert_eq!(request.body, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_raw_response_success_range() {
        let ok = RawResponse {
            status: 204,
            body: Bytes::new(),
        };
        assert!(ok.is_success());

        let not_found = RawResponse {
            status: 404,
            body: Bytes::from_static(b"missing"),
        };
        assert!(!not_found.is_success());
        assert_eq!(not_found.body_text(), "missing");
    }
}
