use serde::{Deserialize, Serialize};

/// Input to a provisioning run, as submitted from the new-workspace form.
///
/// `client_port` is kept optional and wide so that a missing or out-of-range
/// value reaches the validator instead of failing during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    /// User-chosen service name, used (sanitized) for the worker cluster
    #[serde(default)]
    pub service_name_prefix: String,
    #[serde(default)]
    pub client_port: Option<i64>,
    #[serde(default)]
    pub node_names: Vec<String>,
    /// Plugin ids installed on the worker cluster
    #[serde(default)]
    pub plugins: Vec<String>,
}

impl ProvisioningRequest {
    pub fn new(
        service_name_prefix: impl Into<String>,
        client_port: Option<i64>,
        node_names: Vec<String>,
    ) -> Self {
        Self {
            service_name_prefix: service_name_prefix.into(),
            client_port,
            node_names,
            plugins: Vec::new(),
        }
    }

    pub fn with_plugins(mut self, plugins: Vec<String>) -> Self {
        self.plugins = plugins;
        self
    }
}
