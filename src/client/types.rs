use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Data structures (pure, no I/O)
// ============================================================================

/// The three cluster kinds that make up a workspace, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterKind {
    CoordinationService,
    Broker,
    Worker,
}

impl ClusterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterKind::CoordinationService => "coordination-service",
            ClusterKind::Broker => "broker",
            ClusterKind::Worker => "worker",
        }
    }

    /// Collection path under `/api/` for this kind
    pub fn resource_path(&self) -> &'static str {
        match self {
            ClusterKind::CoordinationService => "zookeepers",
            ClusterKind::Broker => "brokers",
            ClusterKind::Worker => "workers",
        }
    }
}

impl fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cluster created during a provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    pub name: String,
    pub kind: ClusterKind,
    pub client_port: u16,
    /// Name of the cluster this one is bound to (none for the coordination service)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound_cluster_name: Option<String>,
    pub node_names: BTreeSet<String>,
}

/// Body of `POST /api/zookeepers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperParams {
    pub name: String,
    pub client_port: u16,
    pub peer_port: u16,
    pub election_port: u16,
    pub node_names: Vec<String>,
}

/// Body of `POST /api/brokers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerParams {
    pub name: String,
    pub zookeeper_cluster_name: String,
    pub client_port: u16,
    pub exporter_port: u16,
    pub jmx_port: u16,
    pub node_names: Vec<String>,
}

/// Body of `POST /api/workers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerParams {
    pub name: String,
    pub broker_cluster_name: String,
    pub client_port: u16,
    pub jmx_port: u16,
    pub plugins: Vec<String>,
    pub node_names: Vec<String>,
}

impl ZookeeperParams {
    pub fn descriptor(&self, name: String) -> ClusterDescriptor {
        ClusterDescriptor {
            name,
            kind: ClusterKind::CoordinationService,
            client_port: self.client_port,
            bound_cluster_name: None,
            node_names: self.node_names.iter().cloned().collect(),
        }
    }
}

impl BrokerParams {
    pub fn descriptor(&self, name: String) -> ClusterDescriptor {
        ClusterDescriptor {
            name,
            kind: ClusterKind::Broker,
            client_port: self.client_port,
            bound_cluster_name: Some(self.zookeeper_cluster_name.clone()),
            node_names: self.node_names.iter().cloned().collect(),
        }
    }
}

impl WorkerParams {
    pub fn descriptor(&self, name: String) -> ClusterDescriptor {
        ClusterDescriptor {
            name,
            kind: ClusterKind::Worker,
            client_port: self.client_port,
            bound_cluster_name: Some(self.broker_cluster_name.clone()),
            node_names: self.node_names.iter().cloned().collect(),
        }
    }
}

/// Execution state of a cluster's container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Pending,
    Running,
    Failed,
    Unknown,
}

impl ContainerState {
    /// Map the backend's container state string (docker-style, any case)
    pub fn from_backend(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "running" => ContainerState::Running,
            "created" | "restarting" | "pending" => ContainerState::Pending,
            "exited" | "dead" | "failed" => ContainerState::Failed,
            _ => ContainerState::Unknown,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Pending => "pending",
            ContainerState::Running => "running",
            ContainerState::Failed => "failed",
            ContainerState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Snapshot of a cluster's first container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub cluster_name: String,
    pub state: ContainerState,
}

// ============================================================================
// Wire envelope
// ============================================================================

/// Every backend response is wrapped as `{ isSuccess, result }`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(rename = "isSuccess", default)]
    pub is_success: bool,
    #[serde(default)]
    pub result: Value,
}

impl ApiEnvelope {
    /// Unwrap the payload, or the backend's error message if `isSuccess` is false
    pub fn into_result(self) -> Result<Value, String> {
        if self.is_success {
            Ok(self.result)
        } else {
            Err(error_message(&self.result))
        }
    }
}

fn error_message(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| result.to_string()),
        Value::Null => "request was not successful".to_string(),
        other => other.to_string(),
    }
}

/// `result` of a create call; only the echoed name is used
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedCluster {
    #[serde(default)]
    pub name: Option<String>,
}

/// One entry of `result` in `GET /api/containers/{name}`
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerGroup {
    #[serde(default)]
    pub containers: Vec<ContainerInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerInfo {
    #[serde(default)]
    pub state: Option<String>,
}

/// State of `result[0].containers[0]`, `Unknown` when either is absent
pub fn first_container_state(groups: &[ContainerGroup]) -> ContainerState {
    groups
        .first()
        .and_then(|g| g.containers.first())
        .and_then(|c| c.state.as_deref())
        .map(ContainerState::from_backend)
        .unwrap_or(ContainerState::Unknown)
}
