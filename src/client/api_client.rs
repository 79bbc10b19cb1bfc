//! # Network Transport
//!
//! The sync engine only needs two things from the network: deliver one
//! queued write, and tell whether the backend answers at all. `Transport`
//! is that seam; `HttpTransport` implements it with `reqwest`.
//!
//! Any non-2xx response is a failure. A 204 carries no body.

use crate::client::config::Config;
use crate::client::offline::queue::{Method, PendingOperation};
use crate::shared::error::SyncError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// One write to deliver
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    /// Target endpoint
    pub endpoint: String,
    /// Write verb
    pub method: Method,
    /// JSON body
    pub payload: serde_json::Value,
    /// Sent as `Idempotency-Key` when present
    pub idempotency_key: Option<Uuid>,
}

impl DeliveryRequest {
    pub fn new(endpoint: impl Into<String>, method: Method, payload: serde_json::Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            payload,
            idempotency_key: None,
        }
    }
}

impl From<&PendingOperation> for DeliveryRequest {
    fn from(op: &PendingOperation) -> Self {
        Self {
            endpoint: op.endpoint.clone(),
            method: op.method,
            payload: op.payload.clone(),
            idempotency_key: (!op.idempotency_key.is_nil()).then_some(op.idempotency_key),
        }
    }
}

/// Successful (2xx) response
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResponse {
    /// HTTP status
    pub status: u16,
    /// Parsed body, `None` for 204 or non-JSON bodies
    pub body: Option<serde_json::Value>,
}

/// Why a delivery attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl DeliveryError {
    /// Whether retrying can never succeed
    ///
    /// Client errors are permanent except 408 (timeout) and 429 (rate limit).
    pub fn is_permanent(&self) -> bool {
        match self {
            DeliveryError::Rejected { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            _ => false,
        }
    }
}

impl From<DeliveryError> for SyncError {
    fn from(err: DeliveryError) -> Self {
        SyncError::delivery(err.to_string())
    }
}

/// Network transport consumed by the sync engine
pub trait Transport: Send + Sync {
    /// Deliver one write
    fn deliver<'a>(
        &'a self,
        request: &'a DeliveryRequest,
    ) -> BoxFuture<'a, Result<DeliveryResponse, DeliveryError>>;

    /// Whether the backend is reachable
    fn health_check(&self) -> BoxFuture<'_, bool>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Transport")
    }
}

/// Deliver with an upper bound on the attempt duration
///
/// Exceeding `timeout` is reported as `DeliveryError::Timeout`.
pub async fn deliver_with_timeout(
    transport: &dyn Transport,
    request: &DeliveryRequest,
    timeout: Duration,
) -> Result<DeliveryResponse, DeliveryError> {
    match tokio::time::timeout(timeout, transport.deliver(request)).await {
        Ok(result) => result,
        Err(_) => Err(DeliveryError::Timeout(timeout)),
    }
}

/// `reqwest`-backed transport for the REST backend
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: Config,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn with_client(config: Config, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn send(&self, request: &DeliveryRequest) -> Result<DeliveryResponse, DeliveryError> {
        let url = self.config.api_url(&request.endpoint);
        let method = match request.method {
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        tracing::debug!(%url, method = %request.method, "delivering");

        let mut builder = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json");
        if let Some(token) = self.config.get_token() {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(key) = request.idempotency_key {
            builder = builder.header("Idempotency-Key", key.to_string());
        }
        if !request.payload.is_null() {
            builder = builder.json(&request.payload);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        if status == 204 {
            return Ok(DeliveryResponse { status, body: None });
        }

        let text = response.text().await.map_err(map_reqwest_error)?;
        let body = serde_json::from_str::<serde_json::Value>(&text).ok();

        if !(200..300).contains(&status) {
            let message = body
                .as_ref()
                .and_then(|b| b.get("message").or_else(|| b.get("error")))
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(DeliveryError::Rejected { status, message });
        }

        Ok(DeliveryResponse { status, body })
    }

    async fn probe(&self) -> bool {
        let url = self.config.api_url("/health");
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(%url, error = %e, "health check failed");
                false
            }
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout(Duration::ZERO)
    } else {
        DeliveryError::Network(err.to_string())
    }
}

impl Transport for HttpTransport {
    fn deliver<'a>(
        &'a self,
        request: &'a DeliveryRequest,
    ) -> BoxFuture<'a, Result<DeliveryResponse, DeliveryError>> {
        self.send(request).boxed()
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        self.probe().boxed()
    }
}
