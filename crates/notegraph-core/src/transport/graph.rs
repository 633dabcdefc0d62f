//! reqwest-backed [`Transport`] for the remote notes API.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use notegraph_config::ClientConfig;
use notegraph_telemetry::Metrics;
use reqwest::Client;
use reqwest::header::{HeaderName, HeaderValue};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ApiRequest, ApiResponse, HEADER_CLIENT_REQUEST_ID, TokenSource, Transport};
use crate::error::{NoteError, NoteResult};

const STATUS_UNAUTHORIZED: u16 = 401;

/// HTTP transport that authenticates every request with a bearer token.
///
/// A 401 triggers at most one token refresh and one retry. Refreshes are serialized:
/// a caller that waited on another caller's refresh reuses the new token instead of
/// refreshing again.
#[derive(Clone)]
pub struct GraphTransport {
    client: Client,
    tokens: Arc<dyn TokenSource>,
    refresh_lock: Arc<Mutex<()>>,
    metrics: Metrics,
}

impl GraphTransport {
    /// Build a transport using the configured timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Transport`] when the HTTP client cannot be constructed.
    pub fn new(
        config: &ClientConfig,
        tokens: Arc<dyn TokenSource>,
        metrics: Metrics,
    ) -> NoteResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| NoteError::Transport {
                operation: "build http client",
                source,
            })?;
        Ok(Self::with_client(client, tokens, metrics))
    }

    /// Wrap an existing reqwest client.
    #[must_use]
    pub fn with_client(client: Client, tokens: Arc<dyn TokenSource>, metrics: Metrics) -> Self {
        Self {
            client,
            tokens,
            refresh_lock: Arc::new(Mutex::new(())),
            metrics,
        }
    }

    async fn current_token(&self, operation: &'static str) -> NoteResult<String> {
        self.tokens
            .access_token()
            .await
            .map_err(|err| NoteError::auth(operation, err))
    }

    async fn refreshed_token(&self, operation: &'static str, rejected: &str) -> NoteResult<String> {
        let _guard = self.refresh_lock.lock().await;
        let latest = self.current_token(operation).await?;
        if latest != rejected {
            debug!(operation, "token already refreshed by a concurrent request");
            return Ok(latest);
        }
        let token = self
            .tokens
            .refresh()
            .await
            .map_err(|err| NoteError::auth(operation, err))?;
        self.metrics.inc_token_refresh();
        info!(operation, "refreshed bearer token after 401");
        Ok(token)
    }

    async fn execute(&self, request: &ApiRequest, token: &str) -> NoteResult<ApiResponse> {
        let operation = request.operation;
        let request_id = Uuid::new_v4().to_string();
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .bearer_auth(token)
            .header(HEADER_CLIENT_REQUEST_ID, request_id.as_str());
        for (name, value) in &request.headers {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                warn!(operation, header = %name, "dropping invalid request header");
                continue;
            };
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|source| NoteError::Transport { operation, source })?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect::<BTreeMap<_, _>>();
        let body = response
            .bytes()
            .await
            .map_err(|source| NoteError::Transport { operation, source })?
            .to_vec();

        self.metrics
            .inc_http_request(request.method.as_str(), status);
        debug!(
            operation,
            method = %request.method,
            status,
            client_request_id = %request_id,
            "remote request completed"
        );
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for GraphTransport {
    async fn send(&self, request: ApiRequest) -> NoteResult<ApiResponse> {
        let token = self.current_token(request.operation).await?;
        let response = self.execute(&request, &token).await?;
        if response.status != STATUS_UNAUTHORIZED {
            return Ok(response);
        }

        warn!(operation = request.operation, "remote API rejected bearer token");
        let token = self.refreshed_token(request.operation, &token).await?;
        self.execute(&request, &token).await
    }
}
