//! Scripted test doubles for the transport and refresh seams.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;

use cirrusdrive_common::{Error, Result};

use crate::auth::Tokens;
use crate::token::RefreshTokens;
use crate::transport::{ApiRequest, RawResponse, Transport};

/// A request the scripted transport saw, with the bearer it carried.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: Option<Vec<u8>>,
    pub bearer: String,
}

/// Transport that replays a fixed sequence of responses.
///
/// Plays the role a real network would in tests of the request path.
/// Responses are consumed in order; running out of script is a test bug and
/// panics.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse>>>,
    seen: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and body.
    pub fn respond(&self, status: u16, body: impl Into<Bytes>) {
        self.script.lock().unwrap().push_back(Ok(RawResponse {
            status,
            body: body.into(),
        }));
    }

    /// Queue a JSON response.
    pub fn respond_json(&self, status: u16, body: serde_json::Value) {
        self.respond(status, body.to_string());
    }

    /// Queue a transport-level failure.
    pub fn fail(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(Error::Network(message.to_string())));
    }

    /// All requests executed so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// Number of requests executed so far.
    pub fn request_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &ApiRequest, bearer: &str) -> Result<RawResponse> {
        self.seen.lock().unwrap().push(RecordedRequest {
            method: request.method.to_string(),
            url: request.url.clone(),
            body: request.body.clone(),
            bearer: bearer.to_string(),
        });

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedTransport ran out of scripted responses")
    }
}

/// Refresher that always succeeds with a fixed token pair.
pub struct StaticRefresher {
    tokens: Tokens,
}

impl StaticRefresher {
    pub fn new(tokens: Tokens) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl RefreshTokens for StaticRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<Tokens> {
        Ok(self.tokens.clone())
    }
}

/// Refresher that always fails, as when the provider has revoked the grant.
pub struct RejectingRefresher;

#[async_trait]
impl RefreshTokens for RejectingRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<Tokens> {
        Err(Error::Authentication(
            "Refresh token rejected by the identity provider".to_string(),
        ))
    }
}
