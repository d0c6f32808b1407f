use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{
    first_container_state, ApiEnvelope, BrokerParams, ClusterDescriptor, ClusterKind,
    ContainerGroup, ContainerStatus, CreatedCluster, WorkerParams, ZookeeperParams,
};
use crate::config::ProvisionerConfig;

/// Default timeout for backend calls other than the coordination-service create
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordination-service bootstrap is slow; its create call gets three minutes
pub const COORDINATION_CREATE_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Backend rejected {endpoint}: {message}")]
    Rejected { endpoint: String, message: String },

    #[error("JSON parse error: {0}")]
    Parse(String),
}

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

/// Backend calls used by the provisioning workflow.
///
/// Create calls provision real containers and are not idempotent, so
/// implementations must never retry them.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    async fn create_coordination_service(
        &self,
        params: &ZookeeperParams,
    ) -> Result<ClusterDescriptor, RequestError>;

    async fn create_broker(&self, params: &BrokerParams)
        -> Result<ClusterDescriptor, RequestError>;

    async fn create_worker(&self, params: &WorkerParams)
        -> Result<ClusterDescriptor, RequestError>;

    async fn fetch_container_status(
        &self,
        cluster_name: &str,
    ) -> Result<ContainerStatus, RequestError>;
}

// ============================================================================
// SBIO: I/O implementation (real HTTP client)
// ============================================================================

#[derive(Clone)]
pub struct HttpServiceClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    coordination_timeout: Duration,
}

impl HttpServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            coordination_timeout: COORDINATION_CREATE_TIMEOUT,
        }
    }

    pub fn from_config(config: &ProvisionerConfig) -> Self {
        Self::new(config.api_url.clone()).with_timeouts(
            config.request_timeout(),
            config.coordination_timeout(),
        )
    }

    pub fn with_timeouts(mut self, request: Duration, coordination: Duration) -> Self {
        self.request_timeout = request;
        self.coordination_timeout = coordination;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `/api/containers/{name}` with the name percent-encoded as one segment
    fn container_url(&self, cluster_name: &str) -> Result<Url, RequestError> {
        let mut url =
            Url::parse(&self.url("containers")).map_err(|e| RequestError::Http(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RequestError::Http(format!("invalid base URL {}", self.base_url)))?
            .push(cluster_name);
        Ok(url)
    }

    /// Send a request and unwrap the `{ isSuccess, result }` envelope
    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, RequestError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RequestError::Timeout(endpoint.to_string())
            } else {
                RequestError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RequestError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| RequestError::Parse(e.to_string()))?;

        envelope.into_result().map_err(|message| {
            warn!(endpoint = %endpoint, "Backend reported failure: {}", message);
            RequestError::Rejected {
                endpoint: endpoint.to_string(),
                message,
            }
        })
    }

    /// Issue one create call and return the cluster name the backend echoed
    async fn create<P: Serialize + Sync>(
        &self,
        kind: ClusterKind,
        params: &P,
        timeout: Duration,
    ) -> Result<Option<String>, RequestError> {
        let url = self.url(kind.resource_path());
        debug!("Creating {} cluster via POST {}", kind, url);

        let request = self.client.post(&url).json(params).timeout(timeout);
        let result = self.send(kind.resource_path(), request).await?;

        let created: CreatedCluster =
            serde_json::from_value(result).map_err(|e| RequestError::Parse(e.to_string()))?;
        Ok(created.name)
    }
}

/// Prefer the name the backend echoed, falling back to the requested one.
/// An empty echo counts as no echo.
fn resolve_name(kind: ClusterKind, requested: &str, echoed: Option<String>) -> String {
    match echoed.filter(|name| !name.is_empty()) {
        Some(name) if name != requested => {
            warn!(
                "Backend renamed {} cluster {} to {}",
                kind, requested, name
            );
            name
        }
        Some(name) => name,
        None => requested.to_string(),
    }
}

#[async_trait]
impl ServiceClient for HttpServiceClient {
    async fn create_coordination_service(
        &self,
        params: &ZookeeperParams,
    ) -> Result<ClusterDescriptor, RequestError> {
        let kind = ClusterKind::CoordinationService;
        let echoed = self.create(kind, params, self.coordination_timeout).await?;
        Ok(params.descriptor(resolve_name(kind, &params.name, echoed)))
    }

    async fn create_broker(
        &self,
        params: &BrokerParams,
    ) -> Result<ClusterDescriptor, RequestError> {
        let kind = ClusterKind::Broker;
        let echoed = self.create(kind, params, self.request_timeout).await?;
        Ok(params.descriptor(resolve_name(kind, &params.name, echoed)))
    }

    async fn create_worker(
        &self,
        params: &WorkerParams,
    ) -> Result<ClusterDescriptor, RequestError> {
        let kind = ClusterKind::Worker;
        let echoed = self.create(kind, params, self.request_timeout).await?;
        Ok(params.descriptor(resolve_name(kind, &params.name, echoed)))
    }

    async fn fetch_container_status(
        &self,
        cluster_name: &str,
    ) -> Result<ContainerStatus, RequestError> {
        let url = self.container_url(cluster_name)?;
        let endpoint = url.path().to_string();
        let request = self.client.get(url).timeout(self.request_timeout);
        let result = self.send(&endpoint, request).await?;

        let groups: Vec<ContainerGroup> = match result {
            Value::Null => Vec::new(),
            other => {
                serde_json::from_value(other).map_err(|e| RequestError::Parse(e.to_string()))?
            }
        };

        Ok(ContainerStatus {
            cluster_name: cluster_name.to_string(),
            state: first_container_state(&groups),
        })
    }
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================
