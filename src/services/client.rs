//! Remote Analysis Clients
//!
//! Defines the common interface the orchestrator drives: one client per
//! analysis dimension, each taking a text input and returning a structured
//! payload or failing. Includes the reqwest-backed client for hosted
//! workflow endpoints.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::run::DocumentRef;

/// Errors surfaced by a remote analysis call.
///
/// The orchestrator treats every variant identically: a timeout is just a
/// phase failure like any other.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Non-2xx HTTP response
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure
    #[error("network error: {message}")]
    Network { message: String },

    /// The workflow responded but the payload was not usable
    #[error("malformed payload: {message}")]
    Malformed { message: String },

    /// The call exceeded its per-phase timeout
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The call was cancelled by the shared run signal
    #[error("cancelled")]
    Cancelled,
}

/// Result type alias for client calls
pub type ClientResult<T> = Result<T, ClientError>;

/// Request handed to an analysis client
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    /// Subject text: the normalized URL or the document body
    pub input: String,
    /// Short-form company description derived from the gating result;
    /// absent for the gating call itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brief: Option<String>,
    /// Attached document, accepted by the gating client only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentRef>,
}

/// One hosted analysis workflow
///
/// Implementations enforce their own call-level timeout and report it as
/// an ordinary failure; the orchestrator imposes no timeout of its own.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Workflow name for identification and logging
    fn name(&self) -> &str;

    /// Run the analysis, honoring the shared cancellation signal at every
    /// await point
    async fn analyze(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> ClientResult<serde_json::Value>;
}

/// Map an HTTP error status to a client error
pub fn parse_http_error(status: u16, body: &str) -> ClientError {
    match status {
        400..=499 => ClientError::Http {
            status,
            message: body.to_string(),
        },
        500..=599 => ClientError::Http {
            status,
            message: if body.is_empty() {
                "server error".to_string()
            } else {
                body.to_string()
            },
        },
        _ => ClientError::Http {
            status,
            message: format!("unexpected status: {}", body),
        },
    }
}

/// Client for a hosted analysis workflow reached over HTTPS
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    timeout: std::time::Duration,
    http: reqwest::Client,
}

impl HttpAnalysisClient {
    /// Create a client for one workflow endpoint with a per-call timeout
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: None,
            timeout: std::time::Duration::from_secs(timeout_secs),
            http: reqwest::Client::new(),
        }
    }

    /// Attach a bearer token sent with every call
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn send(&self, request: &AnalysisRequest) -> ClientResult<serde_json::Value> {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
            } else {
                ClientError::Network {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_http_error(status.as_u16(), &body));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ClientError::Malformed {
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> ClientResult<serde_json::Value> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.send(&request) => result,
        }
    }
}
