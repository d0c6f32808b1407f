//! Request validation, run before any backend call

use thiserror::Error;

use super::request::ProvisioningRequest;

pub const MIN_CLIENT_PORT: i64 = 5000;
pub const MAX_CLIENT_PORT: i64 = 65535;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(
        "Invalid port {}. The port has to be a value from 5000 to 65535",
        describe_port(.0)
    )]
    InvalidPort(Option<i64>),

    #[error("You should at least supply a node name")]
    MissingNodes,
}

fn describe_port(port: &Option<i64>) -> String {
    match port {
        Some(p) => p.to_string(),
        None => "(missing)".to_string(),
    }
}

// ============================================================================
// SBIO: Pure validation logic (no I/O)
// ============================================================================

/// Check a provisioning request. The port is checked before the node list.
pub fn validate(request: &ProvisioningRequest) -> Result<(), ValidationError> {
    checked_port(request.client_port)?;
    if request.node_names.is_empty() {
        return Err(ValidationError::MissingNodes);
    }
    Ok(())
}

/// Narrow a client port to `u16` if it lies in the accepted range
pub fn checked_port(port: Option<i64>) -> Result<u16, ValidationError> {
    match port {
        Some(p) if (MIN_CLIENT_PORT..=MAX_CLIENT_PORT).contains(&p) => {
            u16::try_from(p).map_err(|_| ValidationError::InvalidPort(port))
        }
        _ => Err(ValidationError::InvalidPort(port)),
    }
}
