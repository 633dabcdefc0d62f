//! Authenticated transport seam.
//!
//! # Design
//! - Pipelines only see [`Transport`]; the reqwest implementation lives in `graph.rs`.
//! - Token acquisition is delegated to a [`TokenSource`] supplied by the embedding
//!   application.
//! - Callers receive the final post-retry response; non-2xx statuses are data, not
//!   errors, so each operation applies its own success contract.

pub mod graph;

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{NoteError, NoteResult};

pub use graph::GraphTransport;

/// Header carrying the per-request correlation identifier.
pub const HEADER_CLIENT_REQUEST_ID: &str = "client-request-id";

/// A fully resolved request handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Operation name used in logs and error context.
    pub operation: &'static str,
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Extra headers; authorization and correlation headers are added by the transport.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// Request without a body.
    #[must_use]
    pub const fn new(operation: &'static str, method: Method, url: Url) -> Self {
        Self {
            operation,
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Attach a body with its content type.
    #[must_use]
    pub fn with_body(mut self, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        self.headers
            .push(("content-type".to_string(), content_type.into()));
        self.body = Some(body);
        self
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Serialize`] when `payload` cannot be encoded.
    pub fn with_json<T: serde::Serialize + ?Sized>(self, payload: &T) -> NoteResult<Self> {
        let operation = self.operation;
        let body = serde_json::to_vec(payload)
            .map_err(|source| NoteError::Serialize { operation, source })?;
        Ok(self.with_body("application/json", body))
    }
}

/// Final response observed by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers keyed by lowercase name.
    pub headers: BTreeMap<String, String>,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Response with the given status and body and no headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Add a header; the name is stored lowercase.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::MalformedResponse`] when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self, operation: &'static str) -> NoteResult<T> {
        serde_json::from_slice(&self.body).map_err(|_| NoteError::MalformedResponse {
            operation,
            detail: "body is not the expected JSON document",
        })
    }

    /// Convert a non-2xx response into [`NoteError::Remote`].
    ///
    /// # Errors
    ///
    /// Returns the remote error when the status is outside 2xx.
    pub fn require_success(self, operation: &'static str) -> NoteResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(NoteError::remote(operation, self.status, &self.body))
        }
    }
}

/// Executes requests with a bearer token, refreshing and retrying once on 401.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the final response.
    async fn send(&self, request: ApiRequest) -> NoteResult<ApiResponse>;
}

/// Supplies bearer tokens to the transport.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a valid token, refreshing first if the current one has expired.
    async fn access_token(&self) -> anyhow::Result<String>;

    /// Force a refresh after the remote API rejected the current token.
    async fn refresh(&self) -> anyhow::Result<String>;
}

/// Token source that always hands out the same token.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    /// Wrap a fixed bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("StaticToken(..)")
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> anyhow::Result<String> {
        Ok(self.token.clone())
    }

    async fn refresh(&self) -> anyhow::Result<String> {
        Ok(self.token.clone())
    }
}
