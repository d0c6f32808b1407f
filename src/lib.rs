//! Workspace provisioning for a stream-processing platform.
//!
//! A workspace is three clusters created in order: a coordination service
//! (zookeeper), a broker bound to it, and a worker bound to the broker. Each
//! stage waits for its cluster's first container to report running before the
//! next one starts.

pub mod cli;
pub mod client;
pub mod config;
pub mod provision;

pub use client::{ContainerState, ContainerStatus, HttpServiceClient, RequestError, ServiceClient};
pub use config::{ProvisionerConfig, ReadinessPolicy};
pub use provision::{
    validate, ClusterDescriptor, ClusterKind, ProvisioningError, ProvisioningRequest,
    ProvisioningResult, ProvisioningState, Provisioner, ValidationError,
};
